//! Request handlers of the desk.
//!
//! The order handler owns the lifecycle state machine; the message handler
//! gates order conversation threads with the same access policy.

pub mod message;
pub mod order;

pub use message::MessageHandler;
pub use order::OrderHandler;
