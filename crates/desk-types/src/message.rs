//! Conversation messages scoped to a single order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{OrderId, UserId};

/// Server-assigned message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A comment posted on an order thread. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
	pub id: MessageId,
	#[serde(rename = "orderID")]
	pub order_id: OrderId,
	#[serde(rename = "senderID")]
	pub sender_id: UserId,
	pub text: String,
	#[serde(rename = "createdAt")]
	pub created_at: DateTime<Utc>,
}
