//! Storage module for the order desk.
//!
//! This module provides abstractions for persistent storage of desk data,
//! supporting different backend implementations such as in-memory or
//! file-based storage. Backends only deal in bytes; the [`StorageService`]
//! layers typed access, conditional updates and id sequences on top.

use async_trait::async_trait;
use desk_types::{ImplementationRegistry, StorageKey};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Upper bound on optimistic retries before a conditional write gives up.
const MAX_CAS_ATTEMPTS: usize = 32;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs when inserting a key that is already present.
	#[error("Already exists: {0}")]
	AlreadyExists(String),
	/// Error that occurs when a conditional write keeps losing races.
	#[error("Write conflict on {0}")]
	Conflict(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// Keys have the form `namespace:id`. Backends must make
/// [`compare_and_swap`](StorageInterface::compare_and_swap) atomic with
/// respect to every other write on the same key; the desk's single-claim and
/// single-review guarantees rest on it.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, overwriting any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Writes `value` only if the stored bytes equal `expected`.
	///
	/// `expected = None` means the key must be absent. Returns `Ok(false)`
	/// without writing when the stored value differs.
	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		value: Vec<u8>,
	) -> Result<bool, StorageError>;

	/// Returns every `(key, value)` pair in a namespace.
	async fn scan(&self, namespace: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError>;
}

/// Type alias for storage factory functions.
///
/// This is the function signature that all storage implementations must provide
/// to create instances of their storage interface.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Outcome of a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub enum Conditional<T> {
	/// The precondition held and the mutation was committed. Carries the new value.
	Applied(T),
	/// The precondition did not hold on the freshest stored value, which is returned unchanged.
	Rejected(T),
}

/// Builds the backend key for a namespace and id.
fn make_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
	serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend and provides
/// convenient methods for storing and retrieving typed data with
/// automatic JSON serialization.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = make_key(namespace, id);
		self.backend.set_bytes(&key, encode(data)?).await
	}

	/// Stores a value that must not exist yet.
	///
	/// Fails with [`StorageError::AlreadyExists`] instead of overwriting.
	pub async fn insert<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = make_key(namespace, id);
		if self
			.backend
			.compare_and_swap(&key, None, encode(data)?)
			.await?
		{
			Ok(())
		} else {
			Err(StorageError::AlreadyExists(key))
		}
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let key = make_key(namespace, id);
		let bytes = self.backend.get_bytes(&key).await?;
		decode(&bytes)
	}

	/// Deserializes every value of a namespace in one backend call.
	pub async fn scan<T: DeserializeOwned>(&self, namespace: &str) -> Result<Vec<T>, StorageError> {
		self.backend
			.scan(namespace)
			.await?
			.iter()
			.map(|(_, bytes)| decode(bytes))
			.collect()
	}

	/// Applies `apply` to the stored value only if `precondition` holds.
	///
	/// The precondition is evaluated against the freshest stored bytes and
	/// the write is committed with compare-and-swap. When another writer
	/// commits in between, the value is re-read and the precondition is
	/// evaluated again, so a lost race surfaces as [`Conditional::Rejected`]
	/// carrying the winner's state rather than as a write failure.
	pub async fn update_if<T, P, F>(
		&self,
		namespace: &str,
		id: &str,
		precondition: P,
		apply: F,
	) -> Result<Conditional<T>, StorageError>
	where
		T: Serialize + DeserializeOwned + Send,
		P: Fn(&T) -> bool + Send + Sync,
		F: Fn(&mut T) + Send + Sync,
	{
		let key = make_key(namespace, id);

		for attempt in 0..MAX_CAS_ATTEMPTS {
			let current_bytes = self.backend.get_bytes(&key).await?;
			let mut value: T = decode(&current_bytes)?;

			if !precondition(&value) {
				return Ok(Conditional::Rejected(value));
			}

			apply(&mut value);
			let new_bytes = encode(&value)?;

			if self
				.backend
				.compare_and_swap(&key, Some(&current_bytes), new_bytes)
				.await?
			{
				return Ok(Conditional::Applied(value));
			}

			tracing::debug!(key = %key, attempt, "Conditional update lost a race, re-reading");
		}

		Err(StorageError::Conflict(key))
	}

	/// Allocates the next value of a monotonic sequence, starting at 1.
	pub async fn next_id(&self, sequence: &str) -> Result<u64, StorageError> {
		let key = make_key(StorageKey::Sequences.as_str(), sequence);

		for _ in 0..MAX_CAS_ATTEMPTS {
			let current = match self.backend.get_bytes(&key).await {
				Ok(bytes) => Some(bytes),
				Err(StorageError::NotFound) => None,
				Err(e) => return Err(e),
			};

			let next = match &current {
				Some(bytes) => decode::<u64>(bytes)? + 1,
				None => 1,
			};

			if self
				.backend
				.compare_and_swap(&key, current.as_deref(), encode(&next)?)
				.await?
			{
				return Ok(next);
			}
		}

		Err(StorageError::Conflict(key))
	}
}
