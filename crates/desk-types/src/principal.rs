//! Principal and role types.
//!
//! The desk never authenticates anyone itself. An upstream resolver hands it a
//! `(UserId, Role)` pair and the desk only reads those values to evaluate its
//! access policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a user known to the desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for UserId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.trim().parse().map(UserId)
	}
}

/// The two roles a principal can act under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	/// Places orders and follows them through production.
	Customer,
	/// Reviews, claims and fulfils orders.
	Technician,
}

impl Role {
	/// Returns the wire representation of the role.
	pub fn as_str(&self) -> &'static str {
		match self {
			Role::Customer => "customer",
			Role::Technician => "technician",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when a role string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
	type Err = UnknownRole;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"customer" => Ok(Role::Customer),
			"technician" => Ok(Role::Technician),
			other => Err(UnknownRole(other.to_string())),
		}
	}
}

/// The authenticated actor performing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
	pub id: UserId,
	pub role: Role,
}

impl Principal {
	pub fn customer(id: u64) -> Self {
		Self {
			id: UserId(id),
			role: Role::Customer,
		}
	}

	pub fn technician(id: u64) -> Self {
		Self {
			id: UserId(id),
			role: Role::Technician,
		}
	}

	pub fn is_customer(&self) -> bool {
		self.role == Role::Customer
	}

	pub fn is_technician(&self) -> bool {
		self.role == Role::Technician
	}
}

/// Profile record for a principal.
///
/// Profiles are seeded from configuration; a principal without one cannot
/// place orders or post messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	pub id: UserId,
	pub name: String,
	pub role: Role,
}
