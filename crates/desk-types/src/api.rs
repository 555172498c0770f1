//! API types for the order desk HTTP API.
//!
//! This module defines the request bodies, the shared success/error
//! envelopes and the structured `APIError` that maps every failure onto an
//! HTTP status and a stable machine-readable code.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Order, OrderStatus};

/// Largest page size a list request may ask for.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Page size used when the request does not give one.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Body of `POST /orders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrderRequest {
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub quantity: i64,
	#[serde(rename = "imageKey", default)]
	pub image_key: Option<String>,
}

/// Body of `PUT /orders/{id}/review`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewOrderRequest {
	#[serde(default)]
	pub action: String,
	#[serde(default, with = "rust_decimal::serde::float_option")]
	pub price: Option<Decimal>,
	#[serde(default)]
	pub feedback: Option<String>,
}

/// Body of `PUT /orders/{id}/status`.
///
/// The status stays a raw string so an unknown value surfaces as a
/// validation error rather than a generic body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
	#[serde(default)]
	pub status: String,
}

/// Body of `POST /orders/{id}/reorder`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReorderRequest {
	#[serde(default)]
	pub quantity: i64,
}

/// Body of `POST /orders/{id}/messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageRequest {
	#[serde(default)]
	pub text: String,
}

/// Query string of `GET /orders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageQuery {
	pub page: Option<i64>,
	pub limit: Option<i64>,
}

/// A normalized page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
	pub page: u32,
	pub limit: u32,
}

impl PageRequest {
	/// Normalizes raw query values: pages start at 1, the limit falls back
	/// to `default_limit` and is clamped to `1..=MAX_PAGE_LIMIT`.
	pub fn from_query(query: &PageQuery, default_limit: u32) -> Self {
		let page = query.page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
		let limit = match query.limit {
			Some(limit) if limit > 0 => limit.min(MAX_PAGE_LIMIT as i64) as u32,
			_ => default_limit.clamp(1, MAX_PAGE_LIMIT),
		};
		Self { page, limit }
	}

	/// Number of records to skip before this page.
	pub fn offset(&self) -> usize {
		(self.page as usize - 1).saturating_mul(self.limit as usize)
	}
}

impl Default for PageRequest {
	fn default() -> Self {
		Self {
			page: 1,
			limit: DEFAULT_PAGE_LIMIT,
		}
	}
}

/// Order as returned to clients, with the resolved image URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
	#[serde(flatten)]
	pub order: Order,
	#[serde(rename = "imageUrl")]
	pub image_url: Option<String>,
}

/// Success envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
	pub success: bool,
	pub data: T,
}

impl<T> ApiResponse<T> {
	pub fn ok(data: T) -> Self {
		Self {
			success: true,
			data,
		}
	}
}

/// Pagination block of list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
	pub page: u32,
	pub limit: u32,
	pub total: u64,
	#[serde(rename = "totalPages")]
	pub total_pages: u64,
}

impl PaginationMeta {
	pub fn new(request: PageRequest, total: u64) -> Self {
		Self {
			page: request.page,
			limit: request.limit,
			total,
			total_pages: total.div_ceil(request.limit as u64),
		}
	}
}

/// Success envelope for paginated lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
	pub success: bool,
	pub data: Vec<T>,
	pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
	pub fn new(data: Vec<T>, pagination: PaginationMeta) -> Self {
		Self {
			success: true,
			data,
			pagination,
		}
	}
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	ValidationError,
	Unauthorized,
	Forbidden,
	OrderNotFound,
	UserNotFound,
	InvalidState,
	InvalidTransition,
	AlreadyAssigned,
	InvalidOrderState,
	InternalError,
}

impl ErrorCode {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorCode::ValidationError => "VALIDATION_ERROR",
			ErrorCode::Unauthorized => "UNAUTHORIZED",
			ErrorCode::Forbidden => "FORBIDDEN",
			ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
			ErrorCode::UserNotFound => "USER_NOT_FOUND",
			ErrorCode::InvalidState => "INVALID_STATE",
			ErrorCode::InvalidTransition => "INVALID_TRANSITION",
			ErrorCode::AlreadyAssigned => "ALREADY_ASSIGNED",
			ErrorCode::InvalidOrderState => "INVALID_ORDER_STATE",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		}
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error body inside the failure envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
	pub code: ErrorCode,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Failure envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub success: bool,
	pub error: ErrorBody,
}

/// Payload attached to `INVALID_TRANSITION` errors so clients can retry
/// with a legal target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDetails {
	#[serde(rename = "currentStatus")]
	pub current_status: OrderStatus,
	#[serde(rename = "requestedStatus")]
	pub requested_status: OrderStatus,
	#[serde(rename = "allowedStatuses")]
	pub allowed_statuses: Vec<OrderStatus>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed or out-of-range input (400)
	BadRequest {
		code: ErrorCode,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// No usable principal on the request (401)
	Unauthorized { message: String },
	/// The principal may not perform this action (403)
	Forbidden { message: String },
	/// Referenced entity does not exist (404)
	NotFound { code: ErrorCode, message: String },
	/// Business rule failure against current state (422)
	UnprocessableEntity {
		code: ErrorCode,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Internal server error (500)
	InternalServerError { message: String },
}

impl APIError {
	/// Shorthand for a 400 validation failure.
	pub fn validation(message: impl Into<String>) -> Self {
		APIError::BadRequest {
			code: ErrorCode::ValidationError,
			message: message.into(),
			details: None,
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Unauthorized { .. } => 401,
			APIError::Forbidden { .. } => 403,
			APIError::NotFound { .. } => 404,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Returns the machine-readable code for this error.
	pub fn code(&self) -> ErrorCode {
		match self {
			APIError::BadRequest { code, .. } => *code,
			APIError::Unauthorized { .. } => ErrorCode::Unauthorized,
			APIError::Forbidden { .. } => ErrorCode::Forbidden,
			APIError::NotFound { code, .. } => *code,
			APIError::UnprocessableEntity { code, .. } => *code,
			APIError::InternalServerError { .. } => ErrorCode::InternalError,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (message, details) = match self {
			APIError::BadRequest {
				message, details, ..
			}
			| APIError::UnprocessableEntity {
				message, details, ..
			} => (message.clone(), details.clone()),
			APIError::Unauthorized { message }
			| APIError::Forbidden { message }
			| APIError::NotFound { message, .. }
			| APIError::InternalServerError { message } => (message.clone(), None),
		};

		ErrorResponse {
			success: false,
			error: ErrorBody {
				code: self.code(),
				message,
				details,
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let response = self.to_error_response();
		write!(f, "{}: {}", response.error.code, response.error.message)
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		(status, Json(self.to_error_response())).into_response()
	}
}
