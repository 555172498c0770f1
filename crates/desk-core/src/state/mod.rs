//! Persistent state of the desk.
//!
//! The order store owns every read and conditional write against the storage
//! service, along with the status transition table.

pub mod order;

pub use order::{allowed_next, next_status, NewOrder, OrderStore, OrderStoreError};
