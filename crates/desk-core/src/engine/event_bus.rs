//! Event bus for broadcasting desk events.
//!
//! Handlers publish after each committed mutation; any number of consumers
//! subscribe. Publishing with no subscribers is not an error the caller
//! needs to act on.

use desk_types::DeskEvent;
use tokio::sync::broadcast;

/// Broadcast channel shared by all handlers.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<DeskEvent>,
}

impl EventBus {
	/// Creates a new event bus buffering up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event, returning the number of subscribers that received it.
	pub fn publish(
		&self,
		event: DeskEvent,
	) -> Result<usize, broadcast::error::SendError<DeskEvent>> {
		self.sender.send(event)
	}
}
