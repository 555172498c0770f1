//! Storage-related types for the desk system.

use std::str::FromStr;

/// Storage keys for different data collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Key for storing order records
	Orders,
	/// Key for storing order-bound messages
	Messages,
	/// Key for storing user profiles
	Users,
	/// Key for monotonic id sequences
	Sequences,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Messages => "messages",
			StorageKey::Users => "users",
			StorageKey::Sequences => "sequences",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Orders, Self::Messages, Self::Users, Self::Sequences].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"messages" => Ok(Self::Messages),
			"users" => Ok(Self::Users),
			"sequences" => Ok(Self::Sequences),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
