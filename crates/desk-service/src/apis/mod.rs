//! HTTP API handlers.

pub mod extract;
pub mod message;
pub mod order;
