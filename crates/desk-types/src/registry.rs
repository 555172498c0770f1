//! Registry trait for self-registering implementations.
//!
//! Pluggable backends (storage, asset URL resolution) expose a `Registry`
//! struct implementing this trait so the builder can map configuration names
//! to factory functions.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "memory" for `[storage.implementations.memory]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
