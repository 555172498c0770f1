//! Access policy for orders.
//!
//! All authorization decisions about orders go through [`can_access`], a single
//! match over `(Role, Intent)`. List endpoints use [`ListFilter`], the same
//! rule for the `read` intent expressed as a predicate over stored orders.

use desk_types::{Order, Principal, Role, UserId};

/// What a principal is trying to do with an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
	Read,
	CreateMessage,
	Assign,
	Review,
	AdvanceStatus,
	Create,
}

/// Returns whether the role alone may ever perform `intent`.
///
/// Handlers check this before loading the order, so a customer calling a
/// technician-only operation is refused without touching the store.
pub fn role_permits(role: Role, intent: Intent) -> bool {
	matches!(
		(role, intent),
		(Role::Customer, Intent::Create | Intent::Read | Intent::CreateMessage)
			| (
				Role::Technician,
				Intent::Read
					| Intent::CreateMessage
					| Intent::Assign
					| Intent::Review
					| Intent::AdvanceStatus
			)
	)
}

/// Decides whether `principal` may perform `intent` on `order`.
///
/// `Assign` only gates on the role here; whether the order can still be
/// claimed depends on its current state and is decided by the lifecycle
/// handler against the freshest stored record. `Review` is open to any
/// technician while the order is unclaimed, and to its claimant afterwards.
pub fn can_access(principal: &Principal, order: &Order, intent: Intent) -> bool {
	match (principal.role, intent) {
		(Role::Customer, Intent::Create) => true,
		(Role::Customer, Intent::Read | Intent::CreateMessage) => order.is_owned_by(principal.id),
		(Role::Technician, Intent::Read | Intent::CreateMessage | Intent::Review) => {
			order.technician_id.is_none() || order.is_assigned_to(principal.id)
		},
		(Role::Technician, Intent::Assign) => true,
		(Role::Technician, Intent::AdvanceStatus) => order.is_assigned_to(principal.id),
		_ => false,
	}
}

/// Visibility predicate applied by list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
	/// Orders placed by this customer.
	PlacedBy(UserId),
	/// Orders assigned to this technician plus every unassigned order.
	VisibleToTechnician(UserId),
}

impl ListFilter {
	pub fn for_principal(principal: &Principal) -> Self {
		match principal.role {
			Role::Customer => ListFilter::PlacedBy(principal.id),
			Role::Technician => ListFilter::VisibleToTechnician(principal.id),
		}
	}

	pub fn matches(&self, order: &Order) -> bool {
		match self {
			ListFilter::PlacedBy(customer) => order.is_owned_by(*customer),
			ListFilter::VisibleToTechnician(technician) => {
				order.technician_id.is_none() || order.is_assigned_to(*technician)
			},
		}
	}
}
