//! Order types for the desk system.
//!
//! This module defines the order record persisted by the store, the status
//! vocabulary of the lifecycle and the decision a technician submits when
//! reviewing a new order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::UserId;

/// Server-assigned, monotonic order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for OrderId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.trim().parse().map(OrderId)
	}
}

/// A custom product order moving through the review and production workflow.
///
/// `description`, `quantity`, `customer_id`, `image_key` and
/// `original_order_id` never change after creation. The review fields
/// (`price`, `feedback`) are written at most once, by the single review
/// transition, and never together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	pub id: OrderId,
	pub description: String,
	pub quantity: u32,
	pub status: OrderStatus,
	/// Quoted price, present only on accepted orders.
	#[serde(default, with = "rust_decimal::serde::float_option")]
	pub price: Option<Decimal>,
	/// Rejection reason, present only on rejected orders.
	pub feedback: Option<String>,
	#[serde(rename = "customerID")]
	pub customer_id: UserId,
	#[serde(rename = "technicianID")]
	pub technician_id: Option<UserId>,
	#[serde(rename = "imageKey")]
	pub image_key: Option<String>,
	/// Source order when this order was created through a reorder.
	#[serde(rename = "originalOrderID")]
	pub original_order_id: Option<OrderId>,
	#[serde(rename = "createdAt")]
	pub created_at: DateTime<Utc>,
	#[serde(rename = "updatedAt")]
	pub updated_at: DateTime<Utc>,
}

impl Order {
	/// Returns true when `user` holds the assignment on this order.
	pub fn is_assigned_to(&self, user: UserId) -> bool {
		self.technician_id == Some(user)
	}

	/// Returns true when `user` placed this order.
	pub fn is_owned_by(&self, user: UserId) -> bool {
		self.customer_id == user
	}
}

/// Status of an order in the desk workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// Placed by a customer and waiting for review.
	Submitted,
	/// Priced and accepted by a technician.
	Accepted,
	/// Turned down by a technician with feedback. Terminal.
	Rejected,
	/// Being produced.
	InProduction,
	/// Handed over to the carrier.
	Shipped,
	/// Received by the customer. Terminal.
	Delivered,
}

impl OrderStatus {
	/// Returns the wire representation of the status.
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Submitted => "submitted",
			OrderStatus::Accepted => "accepted",
			OrderStatus::Rejected => "rejected",
			OrderStatus::InProduction => "in_production",
			OrderStatus::Shipped => "shipped",
			OrderStatus::Delivered => "delivered",
		}
	}

	/// Returns true for statuses no operation ever moves out of.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Rejected | OrderStatus::Delivered)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when a status string is not part of the workflow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"submitted" => Ok(OrderStatus::Submitted),
			"accepted" => Ok(OrderStatus::Accepted),
			"rejected" => Ok(OrderStatus::Rejected),
			"in_production" => Ok(OrderStatus::InProduction),
			"shipped" => Ok(OrderStatus::Shipped),
			"delivered" => Ok(OrderStatus::Delivered),
			other => Err(UnknownStatus(other.to_string())),
		}
	}
}

/// The action a technician takes when reviewing a submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
	Accept,
	Reject,
}

impl FromStr for ReviewAction {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"accept" => Ok(ReviewAction::Accept),
			"reject" => Ok(ReviewAction::Reject),
			other => Err(format!("unknown review action '{}'", other)),
		}
	}
}

/// A validated review outcome.
///
/// Carrying the price or feedback inside the variant makes it impossible to
/// accept without a price or reject without feedback.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision {
	Accept { price: Decimal },
	Reject { feedback: String },
}

impl ReviewDecision {
	pub fn action(&self) -> ReviewAction {
		match self {
			ReviewDecision::Accept { .. } => ReviewAction::Accept,
			ReviewDecision::Reject { .. } => ReviewAction::Reject,
		}
	}
}
