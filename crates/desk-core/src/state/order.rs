//! Order store and status machine.
//!
//! Orders move `submitted -> accepted -> in_production -> shipped -> delivered`,
//! or `submitted -> rejected`. Review is the only way out of `submitted`; the
//! three production steps are single forward edges taken by
//! [`OrderStore::advance`]. Every mutation here is a conditional update, so
//! concurrent requests resolve first-committer-wins and the loser gets the
//! winner's state back instead of a write failure.

use crate::policy::ListFilter;
use chrono::Utc;
use desk_storage::{Conditional, StorageError, StorageService};
use desk_types::{
	Message, MessageId, Order, OrderId, OrderStatus, PageRequest, ReviewDecision, StorageKey,
	UserId, UserProfile,
};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur in the order store.
#[derive(Debug, Error)]
pub enum OrderStoreError {
	#[error("Order not found: {0}")]
	OrderNotFound(OrderId),
	#[error("User not found: {0}")]
	UserNotFound(UserId),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// Forward edges taken by status advancement. Statuses without an entry never advance.
static ADVANCE_EDGES: Lazy<HashMap<OrderStatus, OrderStatus>> = Lazy::new(|| {
	HashMap::from([
		(OrderStatus::Accepted, OrderStatus::InProduction),
		(OrderStatus::InProduction, OrderStatus::Shipped),
		(OrderStatus::Shipped, OrderStatus::Delivered),
	])
});

/// Returns the single status `from` may advance to, if any.
pub fn next_status(from: OrderStatus) -> Option<OrderStatus> {
	ADVANCE_EDGES.get(&from).copied()
}

/// Returns the statuses `from` may legally advance to.
pub fn allowed_next(from: OrderStatus) -> Vec<OrderStatus> {
	next_status(from).into_iter().collect()
}

/// Fields of an order fixed at creation time.
#[derive(Debug, Clone)]
pub struct NewOrder {
	pub description: String,
	pub quantity: u32,
	pub customer_id: UserId,
	pub image_key: Option<String>,
	pub original_order_id: Option<OrderId>,
}

/// Typed access to orders, messages and user profiles.
pub struct OrderStore {
	storage: Arc<StorageService>,
}

impl OrderStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Loads an order by id.
	pub async fn get_order(&self, id: OrderId) -> Result<Order, OrderStoreError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), &id.to_string())
			.await
			.map_err(|e| match e {
				StorageError::NotFound => OrderStoreError::OrderNotFound(id),
				other => OrderStoreError::Storage(other),
			})
	}

	/// Persists a new order in `submitted` status with a freshly allocated id.
	pub async fn create_order(&self, draft: NewOrder) -> Result<Order, OrderStoreError> {
		let id = OrderId(self.storage.next_id(StorageKey::Orders.as_str()).await?);
		let now = Utc::now();
		let order = Order {
			id,
			description: draft.description,
			quantity: draft.quantity,
			status: OrderStatus::Submitted,
			price: None,
			feedback: None,
			customer_id: draft.customer_id,
			technician_id: None,
			image_key: draft.image_key,
			original_order_id: draft.original_order_id,
			created_at: now,
			updated_at: now,
		};

		self.storage
			.insert(StorageKey::Orders.as_str(), &id.to_string(), &order)
			.await?;
		Ok(order)
	}

	/// Sets the technician on an order that has none.
	pub async fn claim(
		&self,
		id: OrderId,
		technician: UserId,
	) -> Result<Conditional<Order>, OrderStoreError> {
		self.update_order_if(
			id,
			|order| order.technician_id.is_none(),
			move |order| order.technician_id = Some(technician),
		)
		.await
	}

	/// Applies a review decision to an order still in `submitted` that is
	/// unclaimed or claimed by `technician`.
	///
	/// The reviewing technician becomes the assignee.
	pub async fn review(
		&self,
		id: OrderId,
		technician: UserId,
		decision: &ReviewDecision,
	) -> Result<Conditional<Order>, OrderStoreError> {
		self.update_order_if(
			id,
			move |order| {
				order.status == OrderStatus::Submitted
					&& (order.technician_id.is_none() || order.is_assigned_to(technician))
			},
			|order| {
				match decision {
					ReviewDecision::Accept { price } => {
						order.status = OrderStatus::Accepted;
						order.price = Some(*price);
					},
					ReviewDecision::Reject { feedback } => {
						order.status = OrderStatus::Rejected;
						order.feedback = Some(feedback.clone());
					},
				}
				order.technician_id = Some(technician);
			},
		)
		.await
	}

	/// Moves an order from `from` to `to` if it is still in `from` and held by `technician`.
	pub async fn advance(
		&self,
		id: OrderId,
		technician: UserId,
		from: OrderStatus,
		to: OrderStatus,
	) -> Result<Conditional<Order>, OrderStoreError> {
		self.update_order_if(
			id,
			move |order| order.status == from && order.is_assigned_to(technician),
			move |order| order.status = to,
		)
		.await
	}

	/// Returns one page of the orders matching `filter`, newest first, and the total match count.
	///
	/// Filtering, counting and slicing all run over a single scan of the
	/// orders namespace.
	pub async fn list_orders(
		&self,
		filter: &ListFilter,
		page: PageRequest,
	) -> Result<(Vec<Order>, u64), OrderStoreError> {
		let mut visible: Vec<Order> = self
			.storage
			.scan::<Order>(StorageKey::Orders.as_str())
			.await?
			.into_iter()
			.filter(|order| filter.matches(order))
			.collect();
		visible.sort_by(|a, b| b.id.cmp(&a.id));

		let total = visible.len() as u64;
		let page_items = visible
			.into_iter()
			.skip(page.offset())
			.take(page.limit as usize)
			.collect();
		Ok((page_items, total))
	}

	pub async fn get_user(&self, id: UserId) -> Result<UserProfile, OrderStoreError> {
		self.storage
			.retrieve(StorageKey::Users.as_str(), &id.to_string())
			.await
			.map_err(|e| match e {
				StorageError::NotFound => OrderStoreError::UserNotFound(id),
				other => OrderStoreError::Storage(other),
			})
	}

	/// Creates or replaces a user profile.
	pub async fn put_user(&self, profile: &UserProfile) -> Result<(), OrderStoreError> {
		self.storage
			.store(StorageKey::Users.as_str(), &profile.id.to_string(), profile)
			.await?;
		Ok(())
	}

	/// Persists a new message on an order thread.
	pub async fn create_message(
		&self,
		order_id: OrderId,
		sender_id: UserId,
		text: String,
	) -> Result<Message, OrderStoreError> {
		let id = MessageId(self.storage.next_id(StorageKey::Messages.as_str()).await?);
		let message = Message {
			id,
			order_id,
			sender_id,
			text,
			created_at: Utc::now(),
		};

		self.storage
			.insert(StorageKey::Messages.as_str(), &id.to_string(), &message)
			.await?;
		Ok(message)
	}

	/// Returns every message of an order, oldest first.
	pub async fn list_messages(&self, order_id: OrderId) -> Result<Vec<Message>, OrderStoreError> {
		let mut thread: Vec<Message> = self
			.storage
			.scan::<Message>(StorageKey::Messages.as_str())
			.await?
			.into_iter()
			.filter(|message| message.order_id == order_id)
			.collect();
		thread.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
		Ok(thread)
	}

	/// Conditional update of one order that also bumps `updated_at`.
	async fn update_order_if<P, F>(
		&self,
		id: OrderId,
		precondition: P,
		apply: F,
	) -> Result<Conditional<Order>, OrderStoreError>
	where
		P: Fn(&Order) -> bool + Send + Sync,
		F: Fn(&mut Order) + Send + Sync,
	{
		self.storage
			.update_if(
				StorageKey::Orders.as_str(),
				&id.to_string(),
				precondition,
				|order: &mut Order| {
					apply(order);
					order.updated_at = Utc::now();
				},
			)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => OrderStoreError::OrderNotFound(id),
				other => OrderStoreError::Storage(other),
			})
	}
}
