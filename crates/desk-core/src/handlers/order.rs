//! Order lifecycle handler.
//!
//! Runs every order operation in the same order: input validation, role
//! check, load, relationship check, state check, conditional commit. A
//! commit that loses a race re-derives its error from the state the winner
//! left behind, so clients always see the precise outcome.

use crate::engine::event_bus::EventBus;
use crate::error::DeskError;
use crate::policy::{can_access, role_permits, Intent, ListFilter};
use crate::state::{allowed_next, next_status, NewOrder, OrderStore};
use desk_storage::Conditional;
use desk_types::{
	CreateOrderRequest, DeskEvent, Order, OrderId, OrderStatus, PageRequest, Principal,
	ReorderRequest, ReviewAction, ReviewDecision, ReviewOrderRequest, UpdateStatusRequest,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::instrument;

/// Handler for order creation, lookup and lifecycle transitions.
pub struct OrderHandler {
	store: Arc<OrderStore>,
	event_bus: EventBus,
}

impl OrderHandler {
	pub fn new(store: Arc<OrderStore>, event_bus: EventBus) -> Self {
		Self { store, event_bus }
	}

	/// Places a new order owned by the calling customer.
	#[instrument(skip_all, fields(principal = %principal.id))]
	pub async fn create(
		&self,
		principal: &Principal,
		request: CreateOrderRequest,
	) -> Result<Order, DeskError> {
		let description = validate_description(&request.description)?;
		let quantity = validate_quantity(request.quantity)?;

		if !role_permits(principal.role, Intent::Create) {
			return Err(DeskError::Forbidden(
				"Only customers can create orders".into(),
			));
		}
		self.store.get_user(principal.id).await?;

		let order = self
			.store
			.create_order(NewOrder {
				description,
				quantity,
				customer_id: principal.id,
				image_key: normalize_image_key(request.image_key),
				original_order_id: None,
			})
			.await?;

		tracing::info!(order_id = %order.id, quantity, "Order created");
		self.event_bus
			.publish(DeskEvent::OrderCreated {
				order: order.clone(),
			})
			.ok();

		Ok(order)
	}

	/// Loads a single order the principal is allowed to read.
	#[instrument(skip_all, fields(order_id = %id, principal = %principal.id))]
	pub async fn get(&self, principal: &Principal, id: OrderId) -> Result<Order, DeskError> {
		let order = self.store.get_order(id).await?;
		if !can_access(principal, &order, Intent::Read) {
			return Err(DeskError::Forbidden(
				"You do not have access to this order".into(),
			));
		}
		Ok(order)
	}

	/// Lists the orders visible to the principal, newest first.
	#[instrument(skip_all, fields(principal = %principal.id, page = page.page, limit = page.limit))]
	pub async fn list(
		&self,
		principal: &Principal,
		page: PageRequest,
	) -> Result<(Vec<Order>, u64), DeskError> {
		let filter = ListFilter::for_principal(principal);
		let (orders, total) = self.store.list_orders(&filter, page).await?;
		tracing::debug!(returned = orders.len(), total, "Listed orders");
		Ok((orders, total))
	}

	/// Claims an unassigned order for the calling technician.
	#[instrument(skip_all, fields(order_id = %id, principal = %principal.id))]
	pub async fn assign(&self, principal: &Principal, id: OrderId) -> Result<Order, DeskError> {
		if !role_permits(principal.role, Intent::Assign) {
			return Err(DeskError::Forbidden(
				"Only technicians can claim orders".into(),
			));
		}

		let order = self.store.get_order(id).await?;
		if !can_access(principal, &order, Intent::Assign) {
			return Err(DeskError::Forbidden(
				"You are not allowed to claim this order".into(),
			));
		}
		if order.technician_id.is_some() {
			return Err(DeskError::AlreadyAssigned {
				assigned_to_caller: order.is_assigned_to(principal.id),
			});
		}

		match self.store.claim(id, principal.id).await? {
			Conditional::Applied(order) => {
				tracing::info!(technician_id = %principal.id, "Order assigned");
				self.event_bus
					.publish(DeskEvent::OrderAssigned {
						order_id: order.id,
						technician_id: principal.id,
					})
					.ok();
				Ok(order)
			},
			Conditional::Rejected(current) => Err(DeskError::AlreadyAssigned {
				assigned_to_caller: current.is_assigned_to(principal.id),
			}),
		}
	}

	/// Accepts or rejects a submitted order. The reviewer becomes the assignee.
	#[instrument(skip_all, fields(order_id = %id, principal = %principal.id))]
	pub async fn review(
		&self,
		principal: &Principal,
		id: OrderId,
		request: ReviewOrderRequest,
	) -> Result<Order, DeskError> {
		let decision = parse_decision(&request)?;

		if !role_permits(principal.role, Intent::Review) {
			return Err(DeskError::Forbidden(
				"Only technicians can review orders".into(),
			));
		}

		let order = self.store.get_order(id).await?;
		check_review(principal, &order)?;

		match self.store.review(id, principal.id, &decision).await? {
			Conditional::Applied(order) => {
				tracing::info!(
					action = ?decision.action(),
					status = %order.status,
					"Order reviewed"
				);
				self.event_bus
					.publish(DeskEvent::OrderReviewed {
						order_id: order.id,
						technician_id: principal.id,
						action: decision.action(),
					})
					.ok();
				Ok(order)
			},
			Conditional::Rejected(current) => Err(match check_review(principal, &current) {
				Err(e) => e,
				Ok(()) => already_reviewed(current.status),
			}),
		}
	}

	/// Moves an order one step along the production path.
	#[instrument(skip_all, fields(order_id = %id, principal = %principal.id))]
	pub async fn advance_status(
		&self,
		principal: &Principal,
		id: OrderId,
		request: UpdateStatusRequest,
	) -> Result<Order, DeskError> {
		let requested: OrderStatus = request
			.status
			.trim()
			.parse()
			.map_err(|e: desk_types::UnknownStatus| DeskError::Validation(e.to_string()))?;

		if !role_permits(principal.role, Intent::AdvanceStatus) {
			return Err(DeskError::Forbidden(
				"Only technicians can update order status".into(),
			));
		}

		let order = self.store.get_order(id).await?;
		let from = order.status;
		let to = check_advance(principal, &order, requested)?;

		match self.store.advance(id, principal.id, from, to).await? {
			Conditional::Applied(order) => {
				tracing::info!(from = %from, to = %to, "Order status advanced");
				self.event_bus
					.publish(DeskEvent::OrderStatusAdvanced {
						order_id: order.id,
						from,
						to,
					})
					.ok();
				Ok(order)
			},
			Conditional::Rejected(current) => {
				// Another request moved the order first.
				Err(match check_advance(principal, &current, requested) {
					Err(e) => e,
					Ok(_) => DeskError::InvalidTransition {
						current: current.status,
						requested,
						allowed: allowed_next(current.status),
					},
				})
			},
		}
	}

	/// Creates a fresh order from a delivered one. The source is left untouched.
	#[instrument(skip_all, fields(order_id = %id, principal = %principal.id))]
	pub async fn reorder(
		&self,
		principal: &Principal,
		id: OrderId,
		request: ReorderRequest,
	) -> Result<Order, DeskError> {
		let quantity = validate_quantity(request.quantity)?;

		if !role_permits(principal.role, Intent::Create) {
			return Err(DeskError::Forbidden(
				"Only customers can reorder".into(),
			));
		}

		let source = self.store.get_order(id).await?;
		if !source.is_owned_by(principal.id) {
			return Err(DeskError::Forbidden(
				"You can only reorder your own orders".into(),
			));
		}
		if source.status != OrderStatus::Delivered {
			return Err(DeskError::InvalidOrderState {
				current: source.status,
			});
		}

		let order = self
			.store
			.create_order(NewOrder {
				description: source.description.clone(),
				quantity,
				customer_id: principal.id,
				image_key: source.image_key.clone(),
				original_order_id: Some(source.id),
			})
			.await?;

		tracing::info!(new_order_id = %order.id, quantity, "Order reordered");
		self.event_bus
			.publish(DeskEvent::OrderReordered {
				source_id: source.id,
				order: order.clone(),
			})
			.ok();

		Ok(order)
	}
}

fn validate_description(description: &str) -> Result<String, DeskError> {
	let description = description.trim();
	if description.is_empty() {
		return Err(DeskError::Validation("description is required".into()));
	}
	Ok(description.to_string())
}

fn validate_quantity(quantity: i64) -> Result<u32, DeskError> {
	if quantity <= 0 {
		return Err(DeskError::Validation(
			"quantity must be greater than 0".into(),
		));
	}
	u32::try_from(quantity).map_err(|_| DeskError::Validation("quantity is too large".into()))
}

fn normalize_image_key(key: Option<String>) -> Option<String> {
	key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

/// Turns the raw review body into a decision that carries exactly one of price or feedback.
fn parse_decision(request: &ReviewOrderRequest) -> Result<ReviewDecision, DeskError> {
	let action = request.action.trim();
	if action.is_empty() {
		return Err(DeskError::Validation("action is required".into()));
	}

	match action.parse::<ReviewAction>().map_err(DeskError::Validation)? {
		ReviewAction::Accept => match request.price {
			Some(price) if price > Decimal::ZERO => Ok(ReviewDecision::Accept { price }),
			Some(_) => Err(DeskError::Validation(
				"price must be greater than 0".into(),
			)),
			None => Err(DeskError::Validation(
				"price is required when accepting an order".into(),
			)),
		},
		ReviewAction::Reject => match request.feedback.as_deref().map(str::trim) {
			Some(feedback) if !feedback.is_empty() => Ok(ReviewDecision::Reject {
				feedback: feedback.to_string(),
			}),
			_ => Err(DeskError::Validation(
				"feedback is required when rejecting an order".into(),
			)),
		},
	}
}

fn already_reviewed(current: OrderStatus) -> DeskError {
	DeskError::InvalidState {
		current,
		requested: None,
		message: format!("Order has already been reviewed (status: {})", current),
	}
}

/// Checks that `order` is still reviewable and that `principal` does not
/// review over another technician's claim.
fn check_review(principal: &Principal, order: &Order) -> Result<(), DeskError> {
	if order.status != OrderStatus::Submitted {
		return Err(already_reviewed(order.status));
	}
	if !can_access(principal, order, Intent::Review) {
		return Err(DeskError::Forbidden(
			"Order is claimed by another technician".into(),
		));
	}
	Ok(())
}

/// Checks that `principal` may move `order` to `requested` and returns the target.
fn check_advance(
	principal: &Principal,
	order: &Order,
	requested: OrderStatus,
) -> Result<OrderStatus, DeskError> {
	if !can_access(principal, order, Intent::AdvanceStatus) {
		return Err(DeskError::Forbidden(
			"Only the assigned technician can update this order's status".into(),
		));
	}

	let Some(next) = next_status(order.status) else {
		return Err(DeskError::InvalidState {
			current: order.status,
			requested: Some(requested),
			message: format!(
				"Cannot update status from current order state ({})",
				order.status
			),
		});
	};

	if requested != next {
		return Err(DeskError::InvalidTransition {
			current: order.status,
			requested,
			allowed: allowed_next(order.status),
		});
	}

	Ok(next)
}
