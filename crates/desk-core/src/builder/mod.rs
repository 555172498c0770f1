//! Builder pattern for constructing desk engines.
//!
//! Storage backends and asset resolvers are pluggable: the caller hands in
//! factory maps keyed by implementation name and the builder instantiates
//! whatever the configuration names.

use crate::assets::{AssetError, AssetResolver, AssetService};
use crate::engine::{event_bus::EventBus, DeskEngine};
use desk_config::Config;
use desk_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Number of events buffered per subscriber before it starts lagging.
const EVENT_BUS_CAPACITY: usize = 1000;

/// Errors that can occur during desk engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions needed to build a DeskEngine.
pub struct DeskFactories<SF, AF> {
	pub storage_factories: HashMap<String, SF>,
	pub asset_factories: HashMap<String, AF>,
}

/// Builder for constructing a DeskEngine with pluggable implementations.
pub struct DeskBuilder {
	config: Config,
}

impl DeskBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the DeskEngine using the given factories.
	pub fn build<SF, AF>(self, factories: DeskFactories<SF, AF>) -> Result<DeskEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		AF: Fn(&toml::Value) -> Result<Box<dyn AssetResolver>, AssetError>,
	{
		let primary_storage = &self.config.storage.primary;
		let storage_config = self
			.config
			.storage
			.implementations
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary storage '{}' has no configuration",
					primary_storage
				))
			})?;
		let storage_factory = factories
			.storage_factories
			.get(primary_storage)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!("storage '{}'", primary_storage))
			})?;

		let storage_backend = storage_factory(storage_config).map_err(|e| {
			tracing::error!(
				component = "storage",
				implementation = %primary_storage,
				error = %e,
				"Failed to create storage implementation"
			);
			BuilderError::Config(format!(
				"Failed to create storage implementation '{}': {}",
				primary_storage, e
			))
		})?;
		tracing::info!(component = "storage", implementation = %primary_storage, "Loaded");
		let storage = Arc::new(StorageService::new(storage_backend));

		let assets = match &self.config.assets {
			Some(assets_config) => {
				let primary = &assets_config.primary;
				let resolver_config = assets_config.implementations.get(primary).ok_or_else(|| {
					BuilderError::Config(format!(
						"Primary asset resolver '{}' has no configuration",
						primary
					))
				})?;
				let factory = factories.asset_factories.get(primary).ok_or_else(|| {
					BuilderError::MissingComponent(format!("asset resolver '{}'", primary))
				})?;
				let resolver = factory(resolver_config).map_err(|e| {
					BuilderError::Config(format!(
						"Failed to create asset resolver '{}': {}",
						primary, e
					))
				})?;
				tracing::info!(component = "assets", implementation = %primary, "Loaded");
				AssetService::new(resolver)
			},
			None => {
				tracing::info!(component = "assets", "No asset resolver configured");
				AssetService::disabled()
			},
		};

		Ok(DeskEngine::new(
			self.config,
			storage,
			assets,
			EventBus::new(EVENT_BUS_CAPACITY),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::assets;
	use desk_config::builders::config::ConfigBuilder;
	use desk_types::{Order, OrderId, OrderStatus, UserId};

	type StorageFn = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;
	type AssetFn = fn(&toml::Value) -> Result<Box<dyn AssetResolver>, AssetError>;

	fn factories() -> DeskFactories<StorageFn, AssetFn> {
		let storage_factories: HashMap<String, StorageFn> = desk_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect();
		let asset_factories: HashMap<String, AssetFn> = assets::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect();
		DeskFactories {
			storage_factories,
			asset_factories,
		}
	}

	#[tokio::test]
	async fn test_build_with_static_assets() {
		let engine = DeskBuilder::new(
			ConfigBuilder::new()
				.static_assets("https://cdn.test")
				.build(),
		)
		.build(factories())
		.unwrap();

		let now = chrono::Utc::now();
		let response = engine
			.assets()
			.order_response(Order {
				id: OrderId(1),
				description: "x".into(),
				quantity: 1,
				status: OrderStatus::Submitted,
				price: None,
				feedback: None,
				customer_id: UserId(1),
				technician_id: None,
				image_key: Some("k.png".into()),
				original_order_id: None,
				created_at: now,
				updated_at: now,
			})
			.await;
		assert_eq!(response.image_url.as_deref(), Some("https://cdn.test/k.png"));
	}

	#[test]
	fn test_build_with_file_storage() {
		let dir = tempfile::tempdir().unwrap();
		let engine = DeskBuilder::new(
			ConfigBuilder::new()
				.file_storage(dir.path().to_string_lossy())
				.build(),
		)
		.build(factories());
		assert!(engine.is_ok());
	}

	#[test]
	fn test_missing_factory_is_reported() {
		let config = ConfigBuilder::new().build();
		let empty: DeskFactories<StorageFn, AssetFn> = DeskFactories {
			storage_factories: HashMap::new(),
			asset_factories: HashMap::new(),
		};
		assert!(matches!(
			DeskBuilder::new(config).build(empty),
			Err(BuilderError::MissingComponent(_))
		));
	}

	#[test]
	fn test_bad_asset_config_fails_build() {
		let config = ConfigBuilder::new().static_assets("not-a-url").build();
		assert!(matches!(
			DeskBuilder::new(config).build(factories()),
			Err(BuilderError::Config(_))
		));
	}
}
