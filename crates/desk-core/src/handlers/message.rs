//! Messaging gate for order conversation threads.
//!
//! Posting and reading share the order read rule: whoever may see the order
//! may see and extend its whole thread.

use crate::engine::event_bus::EventBus;
use crate::error::DeskError;
use crate::policy::{can_access, Intent};
use crate::state::OrderStore;
use desk_types::{DeskEvent, Message, OrderId, Principal, SendMessageRequest};
use std::sync::Arc;
use tracing::instrument;

/// Handler for order-bound messages.
pub struct MessageHandler {
	store: Arc<OrderStore>,
	event_bus: EventBus,
}

impl MessageHandler {
	pub fn new(store: Arc<OrderStore>, event_bus: EventBus) -> Self {
		Self { store, event_bus }
	}

	#[instrument(skip_all, fields(order_id = %order_id, principal = %principal.id))]
	pub async fn send_message(
		&self,
		principal: &Principal,
		order_id: OrderId,
		request: SendMessageRequest,
	) -> Result<Message, DeskError> {
		if request.text.trim().is_empty() {
			return Err(DeskError::Validation("text is required".into()));
		}

		let order = self.store.get_order(order_id).await?;
		if !can_access(principal, &order, Intent::CreateMessage) {
			return Err(DeskError::Forbidden(
				"You do not have access to this order".into(),
			));
		}
		self.store.get_user(principal.id).await?;

		let message = self
			.store
			.create_message(order.id, principal.id, request.text)
			.await?;

		tracing::info!(message_id = %message.id, "Message posted");
		self.event_bus
			.publish(DeskEvent::MessagePosted {
				message: message.clone(),
			})
			.ok();

		Ok(message)
	}

	/// Returns the full thread of an order, oldest first.
	#[instrument(skip_all, fields(order_id = %order_id, principal = %principal.id))]
	pub async fn list_messages(
		&self,
		principal: &Principal,
		order_id: OrderId,
	) -> Result<Vec<Message>, DeskError> {
		let order = self.store.get_order(order_id).await?;
		if !can_access(principal, &order, Intent::Read) {
			return Err(DeskError::Forbidden(
				"You do not have access to this order".into(),
			));
		}
		self.store.get_user(principal.id).await?;

		Ok(self.store.list_messages(order.id).await?)
	}
}
