//! Order endpoints.
//!
//! Thin adapters: extract the principal and body, call the lifecycle handler,
//! attach the image URL and wrap the result in the success envelope.

use crate::apis::extract::{ApiJson, Authenticated, OrderPath};
use crate::server::AppState;
use axum::{
	extract::{rejection::QueryRejection, Query, State},
	http::StatusCode,
	response::Json,
};
use desk_types::{
	APIError, ApiResponse, CreateOrderRequest, OrderResponse, PageQuery, PageRequest,
	PaginatedResponse, PaginationMeta, ReorderRequest, ReviewOrderRequest, UpdateStatusRequest,
};
use tracing::warn;

type OrderResult = Result<(StatusCode, Json<ApiResponse<OrderResponse>>), APIError>;

/// Handles POST /orders.
pub async fn create_order(
	State(state): State<AppState>,
	Authenticated(principal): Authenticated,
	ApiJson(request): ApiJson<CreateOrderRequest>,
) -> OrderResult {
	let order = state
		.engine
		.orders()
		.create(&principal, request)
		.await
		.map_err(|e| {
			warn!("Order creation failed: {}", e);
			APIError::from(e)
		})?;

	let response = state.engine.assets().order_response(order).await;
	Ok((StatusCode::CREATED, Json(ApiResponse::ok(response))))
}

/// Handles GET /orders.
pub async fn list_orders(
	State(state): State<AppState>,
	Authenticated(principal): Authenticated,
	query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PaginatedResponse<OrderResponse>>, APIError> {
	let Query(query) = query.map_err(|e| APIError::validation(e.body_text()))?;
	let page = PageRequest::from_query(&query, state.api.default_page_size);

	let (orders, total) = state
		.engine
		.orders()
		.list(&principal, page)
		.await
		.map_err(APIError::from)?;

	let data = state.engine.assets().order_responses(orders).await;
	Ok(Json(PaginatedResponse::new(
		data,
		PaginationMeta::new(page, total),
	)))
}

/// Handles GET /orders/{id}.
pub async fn get_order(
	State(state): State<AppState>,
	Authenticated(principal): Authenticated,
	OrderPath(id): OrderPath,
) -> OrderResult {
	let order = state
		.engine
		.orders()
		.get(&principal, id)
		.await
		.map_err(|e| {
			warn!("Order retrieval failed: {}", e);
			APIError::from(e)
		})?;

	let response = state.engine.assets().order_response(order).await;
	Ok((StatusCode::OK, Json(ApiResponse::ok(response))))
}

/// Handles PUT /orders/{id}/assign.
pub async fn assign_order(
	State(state): State<AppState>,
	Authenticated(principal): Authenticated,
	OrderPath(id): OrderPath,
) -> OrderResult {
	let order = state
		.engine
		.orders()
		.assign(&principal, id)
		.await
		.map_err(|e| {
			warn!("Order assignment failed: {}", e);
			APIError::from(e)
		})?;

	let response = state.engine.assets().order_response(order).await;
	Ok((StatusCode::OK, Json(ApiResponse::ok(response))))
}

/// Handles PUT /orders/{id}/review.
pub async fn review_order(
	State(state): State<AppState>,
	Authenticated(principal): Authenticated,
	OrderPath(id): OrderPath,
	ApiJson(request): ApiJson<ReviewOrderRequest>,
) -> OrderResult {
	let order = state
		.engine
		.orders()
		.review(&principal, id, request)
		.await
		.map_err(|e| {
			warn!("Order review failed: {}", e);
			APIError::from(e)
		})?;

	let response = state.engine.assets().order_response(order).await;
	Ok((StatusCode::OK, Json(ApiResponse::ok(response))))
}

/// Handles PUT /orders/{id}/status.
pub async fn update_status(
	State(state): State<AppState>,
	Authenticated(principal): Authenticated,
	OrderPath(id): OrderPath,
	ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> OrderResult {
	let order = state
		.engine
		.orders()
		.advance_status(&principal, id, request)
		.await
		.map_err(|e| {
			warn!("Status update failed: {}", e);
			APIError::from(e)
		})?;

	let response = state.engine.assets().order_response(order).await;
	Ok((StatusCode::OK, Json(ApiResponse::ok(response))))
}

/// Handles POST /orders/{id}/reorder.
pub async fn reorder(
	State(state): State<AppState>,
	Authenticated(principal): Authenticated,
	OrderPath(id): OrderPath,
	ApiJson(request): ApiJson<ReorderRequest>,
) -> OrderResult {
	let order = state
		.engine
		.orders()
		.reorder(&principal, id, request)
		.await
		.map_err(|e| {
			warn!("Reorder failed: {}", e);
			APIError::from(e)
		})?;

	let response = state.engine.assets().order_response(order).await;
	Ok((StatusCode::CREATED, Json(ApiResponse::ok(response))))
}
