//! Image URL resolution for orders.
//!
//! Orders only store an opaque `imageKey`. Turning it into a URL is a
//! read-only lookup done after the order has been loaded or committed, and a
//! failed lookup never fails the request: the order is returned with
//! `imageUrl: null` and a warning is logged.

use async_trait::async_trait;
use desk_types::{ImplementationRegistry, Order, OrderResponse};
use thiserror::Error;

/// Errors that can occur while resolving asset URLs.
#[derive(Debug, Error)]
pub enum AssetError {
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("Cannot resolve asset '{key}': {reason}")]
	Resolution { key: String, reason: String },
}

/// Issues a URL for a stored asset key.
#[async_trait]
pub trait AssetResolver: Send + Sync {
	async fn resolve_url(&self, key: &str) -> Result<String, AssetError>;
}

/// Type alias for asset resolver factory functions.
pub type AssetFactory = fn(&toml::Value) -> Result<Box<dyn AssetResolver>, AssetError>;

/// Registry trait for asset resolver implementations.
pub trait AssetRegistry: ImplementationRegistry<Factory = AssetFactory> {}

/// Get all registered asset resolver implementations.
pub fn get_all_implementations() -> Vec<(&'static str, AssetFactory)> {
	vec![(StaticRegistry::NAME, StaticRegistry::factory())]
}

/// Resolves keys against a fixed public base URL.
pub struct StaticAssetResolver {
	base_url: String,
}

impl StaticAssetResolver {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into().trim_end_matches('/').to_string(),
		}
	}
}

#[async_trait]
impl AssetResolver for StaticAssetResolver {
	async fn resolve_url(&self, key: &str) -> Result<String, AssetError> {
		let reject = |reason: &str| AssetError::Resolution {
			key: key.to_string(),
			reason: reason.to_string(),
		};

		if key.trim().is_empty() {
			return Err(reject("empty key"));
		}
		if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
			return Err(reject("key escapes the asset root"));
		}
		if key.chars().any(char::is_control) {
			return Err(reject("key contains control characters"));
		}

		Ok(format!("{}/{}", self.base_url, key))
	}
}

/// Factory function to create the static resolver from configuration.
///
/// Configuration parameters:
/// - `base_url`: Public URL prefix the keys are appended to (required)
pub fn create_static_resolver(
	config: &toml::Value,
) -> Result<Box<dyn AssetResolver>, AssetError> {
	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AssetError::Configuration("base_url is required".into()))?;

	if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
		return Err(AssetError::Configuration(format!(
			"base_url must be an http(s) URL, got '{}'",
			base_url
		)));
	}

	Ok(Box::new(StaticAssetResolver::new(base_url)))
}

/// Registry for the static resolver implementation.
pub struct StaticRegistry;

impl ImplementationRegistry for StaticRegistry {
	const NAME: &'static str = "static";
	type Factory = AssetFactory;

	fn factory() -> Self::Factory {
		create_static_resolver
	}
}

impl AssetRegistry for StaticRegistry {}

/// Attaches image URLs to orders on their way out.
pub struct AssetService {
	resolver: Option<Box<dyn AssetResolver>>,
}

impl AssetService {
	pub fn new(resolver: Box<dyn AssetResolver>) -> Self {
		Self {
			resolver: Some(resolver),
		}
	}

	/// A service that never produces image URLs.
	pub fn disabled() -> Self {
		Self { resolver: None }
	}

	/// Builds the client view of an order.
	pub async fn order_response(&self, order: Order) -> OrderResponse {
		let image_url = match (&self.resolver, order.image_key.as_deref()) {
			(Some(resolver), Some(key)) => match resolver.resolve_url(key).await {
				Ok(url) => Some(url),
				Err(e) => {
					tracing::warn!(order_id = %order.id, error = %e, "Image URL unavailable");
					None
				},
			},
			_ => None,
		};

		OrderResponse { order, image_url }
	}

	pub async fn order_responses(&self, orders: Vec<Order>) -> Vec<OrderResponse> {
		let mut responses = Vec::with_capacity(orders.len());
		for order in orders {
			responses.push(self.order_response(order).await);
		}
		responses
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use desk_types::{OrderId, OrderStatus, UserId};

	fn order_with_key(key: Option<&str>) -> Order {
		let now = Utc::now();
		Order {
			id: OrderId(3),
			description: "Chrome set".into(),
			quantity: 1,
			status: OrderStatus::Submitted,
			price: None,
			feedback: None,
			customer_id: UserId(1),
			technician_id: None,
			image_key: key.map(String::from),
			original_order_id: None,
			created_at: now,
			updated_at: now,
		}
	}

	fn static_config(base_url: &str) -> toml::Value {
		let mut table = toml::map::Map::new();
		table.insert("base_url".into(), toml::Value::String(base_url.into()));
		toml::Value::Table(table)
	}

	#[tokio::test]
	async fn test_static_resolver_joins_base_and_key() {
		let resolver = StaticAssetResolver::new("https://cdn.test/uploads/");
		assert_eq!(
			resolver.resolve_url("orders/3.png").await.unwrap(),
			"https://cdn.test/uploads/orders/3.png"
		);
		assert!(resolver.resolve_url("../secret").await.is_err());
		assert!(resolver.resolve_url("").await.is_err());
	}

	#[test]
	fn test_factory_validates_base_url() {
		assert!(create_static_resolver(&toml::Value::Table(toml::map::Map::new())).is_err());
		assert!(create_static_resolver(&static_config("ftp://x")).is_err());
		assert!(create_static_resolver(&static_config("https://cdn.test")).is_ok());
	}

	#[tokio::test]
	async fn test_failed_resolution_leaves_url_empty() {
		let assets = AssetService::new(Box::new(StaticAssetResolver::new("https://cdn.test")));

		let ok = assets.order_response(order_with_key(Some("a.png"))).await;
		assert_eq!(ok.image_url.as_deref(), Some("https://cdn.test/a.png"));

		let broken = assets.order_response(order_with_key(Some("../a.png"))).await;
		assert!(broken.image_url.is_none());
		assert_eq!(broken.order.id, OrderId(3));

		let none = assets.order_response(order_with_key(None)).await;
		assert!(none.image_url.is_none());
	}

	#[tokio::test]
	async fn test_disabled_service_never_resolves() {
		let assets = AssetService::disabled();
		let response = assets.order_response(order_with_key(Some("a.png"))).await;
		assert!(response.image_url.is_none());
	}
}
