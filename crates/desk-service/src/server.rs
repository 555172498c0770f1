//! HTTP server for the order desk API.
//!
//! Routes map one-to-one onto the lifecycle operations. Every response uses
//! the shared `{success, data}` or `{success, error}` envelope.

use crate::apis;
use axum::{
	extract::DefaultBodyLimit,
	http::HeaderValue,
	response::Json,
	routing::{get, post, put},
	Router,
};
use desk_config::{ApiConfig, CorsConfig};
use desk_core::DeskEngine;
use desk_types::ApiResponse;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{Any, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the desk engine for processing requests.
	pub engine: Arc<DeskEngine>,
	/// API settings (page size defaults, limits).
	pub api: ApiConfig,
}

/// Builds the router with every endpoint and the middleware stack.
pub fn router(state: AppState) -> Router {
	let cors = cors_layer(state.api.cors.as_ref());
	let timeout = Duration::from_secs(state.api.timeout_seconds);
	let body_limit = state.api.max_request_size;

	Router::new()
		.route("/health", get(health))
		.route(
			"/orders",
			get(apis::order::list_orders).post(apis::order::create_order),
		)
		.route("/orders/{id}", get(apis::order::get_order))
		.route("/orders/{id}/assign", put(apis::order::assign_order))
		.route("/orders/{id}/review", put(apis::order::review_order))
		.route("/orders/{id}/status", put(apis::order::update_status))
		.route("/orders/{id}/reorder", post(apis::order::reorder))
		.route(
			"/orders/{id}/messages",
			get(apis::message::list_messages).post(apis::message::send_message),
		)
		.layer(DefaultBodyLimit::max(body_limit))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors)
				.layer(TimeoutLayer::new(timeout)),
		)
		.with_state(state)
}

fn cors_layer(config: Option<&CorsConfig>) -> CorsLayer {
	let Some(config) = config else {
		return CorsLayer::new();
	};
	if config.allowed_origins.iter().any(|origin| origin == "*") {
		return CorsLayer::permissive();
	}

	let origins: Vec<HeaderValue> = config
		.allowed_origins
		.iter()
		.filter_map(|origin| match origin.parse::<HeaderValue>() {
			Ok(value) => Some(value),
			Err(_) => {
				tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();

	CorsLayer::new()
		.allow_origin(origins)
		.allow_methods(Any)
		.allow_headers(Any)
}

/// Handles GET /health.
async fn health() -> Json<ApiResponse<Value>> {
	Json(ApiResponse::ok(json!({ "status": "ok" })))
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<DeskEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let app = router(AppState {
		engine,
		api: api_config,
	});

	let listener = TcpListener::bind(&bind_address).await?;
	tracing::info!("Order desk API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::apis::extract::{PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER};
	use axum::body::{to_bytes, Body};
	use axum::http::{Method, Request, StatusCode};
	use desk_config::builders::config::ConfigBuilder;
	use desk_core::{assets::AssetService, EventBus};
	use desk_storage::{implementations::memory::MemoryStorage, StorageService};
	use desk_types::Role;
	use tower::ServiceExt;

	const ALICE: u64 = 1;
	const BOB: u64 = 2;
	const TECH_A: u64 = 10;
	const TECH_B: u64 = 11;

	async fn app() -> Router {
		app_with(ApiConfig::default()).await
	}

	async fn app_with(api: ApiConfig) -> Router {
		let config = ConfigBuilder::new()
			.user(ALICE, "Alice", Role::Customer)
			.user(BOB, "Bob", Role::Customer)
			.user(TECH_A, "Tina", Role::Technician)
			.user(TECH_B, "Theo", Role::Technician)
			.api(Some(api.clone()))
			.build();
		let engine = DeskEngine::new(
			config,
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			AssetService::disabled(),
			EventBus::new(64),
		);
		engine.seed_users().await.unwrap();

		router(AppState {
			engine: Arc::new(engine),
			api,
		})
	}

	async fn call(
		app: &Router,
		method: Method,
		uri: &str,
		principal: Option<(u64, &str)>,
		body: Option<Value>,
	) -> (StatusCode, Value) {
		let mut request = Request::builder().method(method).uri(uri);
		if let Some((id, role)) = principal {
			request = request
				.header(PRINCIPAL_ID_HEADER, id.to_string())
				.header(PRINCIPAL_ROLE_HEADER, role);
		}
		let request = match body {
			Some(body) => request
				.header("content-type", "application/json")
				.body(Body::from(body.to_string()))
				.unwrap(),
			None => request.body(Body::empty()).unwrap(),
		};

		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, value)
	}

	fn customer(id: u64) -> Option<(u64, &'static str)> {
		Some((id, "customer"))
	}

	fn technician(id: u64) -> Option<(u64, &'static str)> {
		Some((id, "technician"))
	}

	async fn place_order(app: &Router, owner: u64) -> u64 {
		let (status, body) = call(
			app,
			Method::POST,
			"/orders",
			customer(owner),
			Some(json!({ "description": "Pink nails with glitter", "quantity": 2 })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		body["data"]["id"].as_u64().unwrap()
	}

	async fn accept(app: &Router, id: u64, tech: u64) {
		let (status, _) = call(
			app,
			Method::PUT,
			&format!("/orders/{}/review", id),
			technician(tech),
			Some(json!({ "action": "accept", "price": 45.00 })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
	}

	async fn advance(app: &Router, id: u64, tech: u64, to: &str) -> (StatusCode, Value) {
		call(
			app,
			Method::PUT,
			&format!("/orders/{}/status", id),
			technician(tech),
			Some(json!({ "status": to })),
		)
		.await
	}

	#[tokio::test]
	async fn test_health() {
		let app = app().await;
		let (status, body) = call(&app, Method::GET, "/health", None, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["success"], true);
		assert_eq!(body["data"]["status"], "ok");
	}

	#[tokio::test]
	async fn test_missing_principal_is_unauthorized() {
		let app = app().await;
		let (status, body) = call(&app, Method::GET, "/orders", None, None).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["success"], false);
		assert_eq!(body["error"]["code"], "UNAUTHORIZED");
	}

	#[tokio::test]
	async fn test_customer_creates_order() {
		let app = app().await;
		let (status, body) = call(
			&app,
			Method::POST,
			"/orders",
			customer(ALICE),
			Some(json!({ "description": "Pink nails with glitter", "quantity": 2 })),
		)
		.await;

		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["success"], true);
		assert_eq!(body["data"]["status"], "submitted");
		assert!(body["data"]["price"].is_null());
		assert_eq!(body["data"]["customerID"], ALICE);
		assert!(body["data"]["technicianID"].is_null());
	}

	#[tokio::test]
	async fn test_create_order_rejects_bad_input() {
		let app = app().await;
		let (status, body) = call(
			&app,
			Method::POST,
			"/orders",
			customer(ALICE),
			Some(json!({ "description": "   ", "quantity": 2 })),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

		let (status, body) = call(
			&app,
			Method::POST,
			"/orders",
			technician(TECH_A),
			Some(json!({ "description": "Nails", "quantity": 1 })),
		)
		.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["error"]["code"], "FORBIDDEN");
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn test_concurrent_assign_has_one_winner() {
		let app = app().await;
		let id = place_order(&app, ALICE).await;
		let uri = format!("/orders/{}/assign", id);

		let (first, second) = tokio::join!(
			call(&app, Method::PUT, &uri, technician(TECH_A), None),
			call(&app, Method::PUT, &uri, technician(TECH_B), None),
		);

		let statuses = [first.0, second.0];
		assert_eq!(
			statuses.iter().filter(|s| **s == StatusCode::OK).count(),
			1
		);
		let (winner, loser) = if first.0 == StatusCode::OK {
			(first, second)
		} else {
			(second, first)
		};
		assert_eq!(loser.0, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(loser.1["error"]["code"], "ALREADY_ASSIGNED");

		let (_, order) = call(
			&app,
			Method::GET,
			&format!("/orders/{}", id),
			customer(ALICE),
			None,
		)
		.await;
		assert_eq!(
			order["data"]["technicianID"],
			winner.1["data"]["technicianID"]
		);
	}

	#[tokio::test]
	async fn test_review_once() {
		let app = app().await;
		let id = place_order(&app, ALICE).await;
		let uri = format!("/orders/{}/review", id);

		let (status, body) = call(
			&app,
			Method::PUT,
			&uri,
			technician(TECH_A),
			Some(json!({ "action": "accept", "price": 45.00 })),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["data"]["status"], "accepted");
		assert_eq!(body["data"]["price"].as_f64(), Some(45.0));
		assert_eq!(body["data"]["technicianID"], TECH_A);

		let (status, body) = call(
			&app,
			Method::PUT,
			&uri,
			technician(TECH_B),
			Some(json!({ "action": "reject", "feedback": "Too late" })),
		)
		.await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"]["code"], "INVALID_STATE");

		let (_, order) = call(
			&app,
			Method::GET,
			&format!("/orders/{}", id),
			customer(ALICE),
			None,
		)
		.await;
		assert_eq!(order["data"]["status"], "accepted");
		assert!(order["data"]["feedback"].is_null());
	}

	#[tokio::test]
	async fn test_review_leaves_foreign_claim_alone() {
		let app = app().await;
		let id = place_order(&app, ALICE).await;
		let (status, _) = call(
			&app,
			Method::PUT,
			&format!("/orders/{}/assign", id),
			technician(TECH_A),
			None,
		)
		.await;
		assert_eq!(status, StatusCode::OK);

		let (status, body) = call(
			&app,
			Method::PUT,
			&format!("/orders/{}/review", id),
			technician(TECH_B),
			Some(json!({ "action": "accept", "price": 45.00 })),
		)
		.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["error"]["code"], "FORBIDDEN");
		assert!(body.get("data").is_none());

		let (status, order) = call(
			&app,
			Method::GET,
			&format!("/orders/{}", id),
			technician(TECH_A),
			None,
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(order["data"]["technicianID"], TECH_A);
		assert_eq!(order["data"]["status"], "submitted");
		assert!(order["data"]["price"].is_null());
	}

	#[tokio::test]
	async fn test_status_update_from_fixed_state_reports_details() {
		let app = app().await;
		let id = place_order(&app, ALICE).await;
		call(
			&app,
			Method::PUT,
			&format!("/orders/{}/assign", id),
			technician(TECH_A),
			None,
		)
		.await;

		let (status, body) = advance(&app, id, TECH_A, "accepted").await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"]["code"], "INVALID_STATE");
		assert_eq!(body["error"]["details"]["currentStatus"], "submitted");
		assert_eq!(body["error"]["details"]["requestedStatus"], "accepted");
		assert_eq!(body["error"]["details"]["allowedStatuses"], json!([]));

		accept(&app, id, TECH_A).await;
		for to in ["in_production", "shipped", "delivered"] {
			advance(&app, id, TECH_A, to).await;
		}
		let (status, body) = advance(&app, id, TECH_A, "shipped").await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"]["code"], "INVALID_STATE");
		assert_eq!(body["error"]["details"]["currentStatus"], "delivered");
		assert_eq!(body["error"]["details"]["requestedStatus"], "shipped");
		assert_eq!(body["error"]["details"]["allowedStatuses"], json!([]));
	}

	#[tokio::test]
	async fn test_skipping_a_status_is_invalid_transition() {
		let app = app().await;
		let id = place_order(&app, ALICE).await;
		accept(&app, id, TECH_A).await;

		let (status, body) = advance(&app, id, TECH_A, "shipped").await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
		assert_eq!(
			body["error"]["details"]["allowedStatuses"],
			json!(["in_production"])
		);

		let (status, body) = advance(&app, id, TECH_A, "in_production").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["data"]["status"], "in_production");
	}

	#[tokio::test]
	async fn test_unknown_status_is_validation_error() {
		let app = app().await;
		let id = place_order(&app, ALICE).await;
		accept(&app, id, TECH_A).await;

		let (status, body) = advance(&app, id, TECH_A, "teleported").await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
	}

	#[tokio::test]
	async fn test_customer_cannot_read_foreign_order() {
		let app = app().await;
		let id = place_order(&app, BOB).await;

		let (status, body) = call(
			&app,
			Method::GET,
			&format!("/orders/{}", id),
			customer(ALICE),
			None,
		)
		.await;
		assert_eq!(status, StatusCode::FORBIDDEN);
		assert_eq!(body["error"]["code"], "FORBIDDEN");
	}

	#[tokio::test]
	async fn test_missing_and_malformed_order_ids() {
		let app = app().await;
		let (status, body) =
			call(&app, Method::GET, "/orders/999", customer(ALICE), None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"]["code"], "ORDER_NOT_FOUND");

		let (status, body) =
			call(&app, Method::GET, "/orders/abc", customer(ALICE), None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
	}

	#[tokio::test]
	async fn test_reorder_delivered_order() {
		let app = app().await;
		let id = place_order(&app, ALICE).await;
		accept(&app, id, TECH_A).await;
		for to in ["in_production", "shipped", "delivered"] {
			let (status, _) = advance(&app, id, TECH_A, to).await;
			assert_eq!(status, StatusCode::OK);
		}

		let (status, body) = call(
			&app,
			Method::POST,
			&format!("/orders/{}/reorder", id),
			customer(ALICE),
			Some(json!({ "quantity": 5 })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["data"]["status"], "submitted");
		assert_eq!(body["data"]["originalOrderID"], id);
		assert_eq!(body["data"]["quantity"], 5);
		assert_eq!(body["data"]["description"], "Pink nails with glitter");
		assert!(body["data"]["imageKey"].is_null());
		assert_ne!(body["data"]["id"], id);

		let (_, source) = call(
			&app,
			Method::GET,
			&format!("/orders/{}", id),
			customer(ALICE),
			None,
		)
		.await;
		assert_eq!(source["data"]["status"], "delivered");
		assert_eq!(source["data"]["quantity"], 2);
	}

	#[tokio::test]
	async fn test_reorder_requires_delivered_source() {
		let app = app().await;
		let id = place_order(&app, ALICE).await;

		let (status, body) = call(
			&app,
			Method::POST,
			&format!("/orders/{}/reorder", id),
			customer(ALICE),
			Some(json!({ "quantity": 1 })),
		)
		.await;
		assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(body["error"]["code"], "INVALID_ORDER_STATE");
	}

	#[tokio::test]
	async fn test_list_is_scoped_and_paginated() {
		let app = app().await;
		for _ in 0..3 {
			place_order(&app, ALICE).await;
		}
		place_order(&app, BOB).await;

		let (status, body) = call(
			&app,
			Method::GET,
			"/orders?page=1&limit=2",
			customer(ALICE),
			None,
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["data"].as_array().unwrap().len(), 2);
		assert_eq!(body["pagination"]["total"], 3);
		assert_eq!(body["pagination"]["totalPages"], 2);
		assert!(body["data"]
			.as_array()
			.unwrap()
			.iter()
			.all(|order| order["customerID"] == ALICE));

		let (_, body) = call(&app, Method::GET, "/orders", technician(TECH_A), None).await;
		assert_eq!(body["pagination"]["total"], 4);

		let (status, body) = call(
			&app,
			Method::GET,
			"/orders?page=first",
			customer(ALICE),
			None,
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
	}

	#[tokio::test]
	async fn test_messages_follow_order_access() {
		let app = app().await;
		let id = place_order(&app, ALICE).await;
		let uri = format!("/orders/{}/messages", id);

		let (status, body) = call(
			&app,
			Method::POST,
			&uri,
			customer(ALICE),
			Some(json!({ "text": "Can you add a heart?" })),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		assert_eq!(body["data"]["text"], "Can you add a heart?");

		let (status, _) = call(
			&app,
			Method::POST,
			&uri,
			customer(BOB),
			Some(json!({ "text": "Hello?" })),
		)
		.await;
		assert_eq!(status, StatusCode::FORBIDDEN);

		let (status, body) = call(&app, Method::GET, &uri, technician(TECH_A), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["data"].as_array().unwrap().len(), 1);
	}

	async fn allowed_origin(app: &Router, origin: &str) -> Option<String> {
		let request = Request::builder()
			.uri("/health")
			.header("origin", origin)
			.body(Body::empty())
			.unwrap();
		let response = app.clone().oneshot(request).await.unwrap();
		response
			.headers()
			.get("access-control-allow-origin")
			.and_then(|value| value.to_str().ok())
			.map(str::to_string)
	}

	#[tokio::test]
	async fn test_cors_allows_only_configured_origins() {
		let restricted = app_with(ApiConfig {
			cors: Some(CorsConfig {
				allowed_origins: vec!["https://desk.test".into(), "bad\norigin".into()],
			}),
			..ApiConfig::default()
		})
		.await;
		assert_eq!(
			allowed_origin(&restricted, "https://desk.test").await.as_deref(),
			Some("https://desk.test")
		);
		assert_eq!(allowed_origin(&restricted, "https://evil.test").await, None);

		let open = app_with(ApiConfig {
			cors: Some(CorsConfig {
				allowed_origins: vec!["*".into()],
			}),
			..ApiConfig::default()
		})
		.await;
		assert_eq!(
			allowed_origin(&open, "https://evil.test").await.as_deref(),
			Some("*")
		);

		let closed = app().await;
		assert_eq!(allowed_origin(&closed, "https://desk.test").await, None);
	}
}
