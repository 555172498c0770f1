//! Core of the order desk.
//!
//! This crate holds the order lifecycle state machine and the access policy
//! that gates it. Requests arrive with an already resolved principal, the
//! handlers load the order from the store, ask the policy, validate the
//! transition and commit it with a conditional update. Committed mutations
//! are published on the event bus for downstream consumers.

pub mod assets;
pub mod builder;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod policy;
pub mod state;

pub use builder::{BuilderError, DeskBuilder, DeskFactories};
pub use engine::{event_bus::EventBus, DeskEngine};
pub use error::DeskError;
pub use policy::{can_access, Intent, ListFilter};
