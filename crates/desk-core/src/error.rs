//! Error taxonomy of the order desk core.
//!
//! Every lifecycle and messaging operation fails with a [`DeskError`]. The
//! transport layer converts it into an [`APIError`] carrying a stable code.

use crate::state::OrderStoreError;
use desk_storage::StorageError;
use desk_types::{APIError, ErrorCode, OrderId, OrderStatus, TransitionDetails, UserId};
use thiserror::Error;

/// Errors returned by desk operations.
#[derive(Debug, Error)]
pub enum DeskError {
	/// Malformed or out-of-range input.
	#[error("{0}")]
	Validation(String),
	/// The principal's role or relationship to the order does not permit the action.
	#[error("{0}")]
	Forbidden(String),
	#[error("Order {0} not found")]
	OrderNotFound(OrderId),
	#[error("User {0} not found")]
	UserNotFound(UserId),
	/// The current status never allows this class of operation.
	///
	/// `requested` is set when a status update was refused; it is echoed
	/// back in the transition details with no allowed targets.
	#[error("{message}")]
	InvalidState {
		current: OrderStatus,
		requested: Option<OrderStatus>,
		message: String,
	},
	/// The current status allows a transition, just not the requested one.
	#[error("Cannot change order status from {current} to {requested}")]
	InvalidTransition {
		current: OrderStatus,
		requested: OrderStatus,
		allowed: Vec<OrderStatus>,
	},
	#[error("{}", already_assigned_message(.assigned_to_caller))]
	AlreadyAssigned { assigned_to_caller: bool },
	#[error("Only delivered orders can be reordered (current status: {current})")]
	InvalidOrderState { current: OrderStatus },
	/// Infrastructure failure. The cause is logged, never returned to clients.
	#[error("Storage error: {0}")]
	Storage(String),
}

fn already_assigned_message(assigned_to_caller: &bool) -> &'static str {
	if *assigned_to_caller {
		"Order is already assigned to you"
	} else {
		"Order is already assigned to another technician"
	}
}

impl From<StorageError> for DeskError {
	fn from(err: StorageError) -> Self {
		DeskError::Storage(err.to_string())
	}
}

impl From<OrderStoreError> for DeskError {
	fn from(err: OrderStoreError) -> Self {
		match err {
			OrderStoreError::OrderNotFound(id) => DeskError::OrderNotFound(id),
			OrderStoreError::UserNotFound(id) => DeskError::UserNotFound(id),
			OrderStoreError::Storage(e) => DeskError::Storage(e.to_string()),
		}
	}
}

fn transition_details(
	current: OrderStatus,
	requested: OrderStatus,
	allowed: Vec<OrderStatus>,
) -> Option<serde_json::Value> {
	serde_json::to_value(TransitionDetails {
		current_status: current,
		requested_status: requested,
		allowed_statuses: allowed,
	})
	.ok()
}

impl From<DeskError> for APIError {
	fn from(err: DeskError) -> Self {
		let message = err.to_string();
		match err {
			DeskError::Validation(_) => APIError::validation(message),
			DeskError::Forbidden(_) => APIError::Forbidden { message },
			DeskError::OrderNotFound(_) => APIError::NotFound {
				code: ErrorCode::OrderNotFound,
				message,
			},
			DeskError::UserNotFound(_) => APIError::NotFound {
				code: ErrorCode::UserNotFound,
				message,
			},
			DeskError::InvalidState {
				current, requested, ..
			} => APIError::UnprocessableEntity {
				code: ErrorCode::InvalidState,
				message,
				details: requested
					.and_then(|requested| transition_details(current, requested, Vec::new())),
			},
			DeskError::InvalidTransition {
				current,
				requested,
				allowed,
			} => APIError::UnprocessableEntity {
				code: ErrorCode::InvalidTransition,
				message,
				details: transition_details(current, requested, allowed),
			},
			DeskError::AlreadyAssigned { .. } => APIError::UnprocessableEntity {
				code: ErrorCode::AlreadyAssigned,
				message,
				details: None,
			},
			DeskError::InvalidOrderState { .. } => APIError::UnprocessableEntity {
				code: ErrorCode::InvalidOrderState,
				message,
				details: None,
			},
			DeskError::Storage(cause) => {
				tracing::error!(error = %cause, "Request failed on storage");
				APIError::InternalServerError {
					message: "Internal server error".to_string(),
				}
			},
		}
	}
}
