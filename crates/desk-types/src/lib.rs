//! Common types module for the order desk system.
//!
//! This module defines the core data types shared by every desk crate: the
//! order record and its status machine vocabulary, order-bound messages,
//! principals and their roles, the HTTP envelope types and the storage keys.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Event types published after committed mutations.
pub mod events;
/// Conversation messages bound to a single order.
pub mod message;
/// Order records, statuses and review decisions.
pub mod order;
/// Authenticated principals, roles and user profiles.
pub mod principal;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage types for managing persistent data.
pub mod storage;

// Re-export all types for convenient access
pub use api::*;
pub use events::*;
pub use message::*;
pub use order::*;
pub use principal::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
