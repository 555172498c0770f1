//! Event types for downstream consumers.
//!
//! Every committed mutation publishes one of these events. Consumers such as
//! the notification hand-off subscribe to the bus; a missing or lagging
//! subscriber never affects the request that produced the event.

use crate::{Message, Order, OrderId, OrderStatus, ReviewAction, UserId};
use serde::{Deserialize, Serialize};

/// Events emitted by the order desk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeskEvent {
	/// A customer placed a new order.
	OrderCreated { order: Order },
	/// A technician claimed an unassigned order.
	OrderAssigned {
		order_id: OrderId,
		technician_id: UserId,
	},
	/// A submitted order was accepted or rejected.
	OrderReviewed {
		order_id: OrderId,
		technician_id: UserId,
		action: ReviewAction,
	},
	/// A production status moved one step forward.
	OrderStatusAdvanced {
		order_id: OrderId,
		from: OrderStatus,
		to: OrderStatus,
	},
	/// A delivered order was reordered into a new one.
	OrderReordered { source_id: OrderId, order: Order },
	/// A message was posted on an order thread.
	MessagePosted { message: Message },
}

impl DeskEvent {
	/// Returns the order this event concerns.
	pub fn order_id(&self) -> OrderId {
		match self {
			DeskEvent::OrderCreated { order } => order.id,
			DeskEvent::OrderAssigned { order_id, .. } => *order_id,
			DeskEvent::OrderReviewed { order_id, .. } => *order_id,
			DeskEvent::OrderStatusAdvanced { order_id, .. } => *order_id,
			DeskEvent::OrderReordered { order, .. } => order.id,
			DeskEvent::MessagePosted { message } => message.order_id,
		}
	}

	/// Short machine-readable name, used in logs.
	pub fn kind(&self) -> &'static str {
		match self {
			DeskEvent::OrderCreated { .. } => "order_created",
			DeskEvent::OrderAssigned { .. } => "order_assigned",
			DeskEvent::OrderReviewed { .. } => "order_reviewed",
			DeskEvent::OrderStatusAdvanced { .. } => "order_status_advanced",
			DeskEvent::OrderReordered { .. } => "order_reordered",
			DeskEvent::MessagePosted { .. } => "message_posted",
		}
	}
}
