//! Order message endpoints.

use crate::apis::extract::{ApiJson, Authenticated, OrderPath};
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use desk_types::{APIError, ApiResponse, Message, SendMessageRequest};

/// Handles POST /orders/{id}/messages.
pub async fn send_message(
	State(state): State<AppState>,
	Authenticated(principal): Authenticated,
	OrderPath(id): OrderPath,
	ApiJson(request): ApiJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Message>>), APIError> {
	let message = state
		.engine
		.messages()
		.send_message(&principal, id, request)
		.await
		.map_err(|e| {
			tracing::warn!("Message rejected: {}", e);
			APIError::from(e)
		})?;

	Ok((StatusCode::CREATED, Json(ApiResponse::ok(message))))
}

/// Handles GET /orders/{id}/messages.
pub async fn list_messages(
	State(state): State<AppState>,
	Authenticated(principal): Authenticated,
	OrderPath(id): OrderPath,
) -> Result<Json<ApiResponse<Vec<Message>>>, APIError> {
	let messages = state
		.engine
		.messages()
		.list_messages(&principal, id)
		.await
		.map_err(APIError::from)?;

	Ok(Json(ApiResponse::ok(messages)))
}
