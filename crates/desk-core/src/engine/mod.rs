//! Desk engine.
//!
//! Holds the wired-up handlers shared by every request and runs the event
//! loop that hands committed events to the notification collaborator.

use crate::assets::AssetService;
use crate::error::DeskError;
use crate::handlers::{MessageHandler, OrderHandler};
use crate::state::OrderStore;
use desk_config::Config;
use desk_storage::StorageService;
use desk_types::{DeskEvent, UserProfile};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

pub mod event_bus;

use event_bus::EventBus;

/// The assembled order desk.
pub struct DeskEngine {
	/// Desk configuration.
	config: Config,
	/// Order store shared by the handlers.
	store: Arc<OrderStore>,
	/// Image URL resolution for outgoing orders.
	assets: AssetService,
	/// Event bus for committed mutations.
	event_bus: EventBus,
	orders: OrderHandler,
	messages: MessageHandler,
}

impl DeskEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		assets: AssetService,
		event_bus: EventBus,
	) -> Self {
		let store = Arc::new(OrderStore::new(storage));
		let orders = OrderHandler::new(Arc::clone(&store), event_bus.clone());
		let messages = MessageHandler::new(Arc::clone(&store), event_bus.clone());

		Self {
			config,
			store,
			assets,
			event_bus,
			orders,
			messages,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn orders(&self) -> &OrderHandler {
		&self.orders
	}

	pub fn messages(&self) -> &MessageHandler {
		&self.messages
	}

	pub fn assets(&self) -> &AssetService {
		&self.assets
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	/// Writes the configured user profiles into the store, replacing existing ones.
	pub async fn seed_users(&self) -> Result<usize, DeskError> {
		for seed in &self.config.users {
			self.store
				.put_user(&UserProfile {
					id: seed.id,
					name: seed.name.clone(),
					role: seed.role,
				})
				.await?;
		}

		tracing::info!(count = self.config.users.len(), "Seeded user profiles");
		Ok(self.config.users.len())
	}

	/// Runs the event loop until Ctrl+C.
	pub async fn run(&self) -> Result<(), DeskError> {
		self.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "Failed to listen for shutdown signal");
			}
		})
		.await
	}

	/// Runs the event loop until `shutdown` completes.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), DeskError>
	where
		F: Future<Output = ()>,
	{
		let mut events = self.event_bus.subscribe();
		tokio::pin!(shutdown);

		loop {
			tokio::select! {
				received = events.recv() => match received {
					Ok(event) => dispatch(&event),
					Err(RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Event consumer fell behind");
					},
					Err(RecvError::Closed) => break,
				},
				_ = &mut shutdown => {
					tracing::info!("Shutdown requested");
					break;
				}
			}
		}

		Ok(())
	}
}

/// Hands an event to the notification collaborator. Today that is the log.
fn dispatch(event: &DeskEvent) {
	match event {
		DeskEvent::OrderStatusAdvanced { order_id, from, to } => {
			tracing::info!(event = event.kind(), order_id = %order_id, from = %from, to = %to, "Notify");
		},
		DeskEvent::OrderReviewed {
			order_id, action, ..
		} => {
			tracing::info!(event = event.kind(), order_id = %order_id, action = ?action, "Notify");
		},
		_ => {
			tracing::info!(event = event.kind(), order_id = %event.order_id(), "Notify");
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_config::builders::config::ConfigBuilder;
	use desk_storage::implementations::memory::MemoryStorage;
	use desk_types::{CreateOrderRequest, Principal, Role, UserId};

	fn engine(config: Config) -> DeskEngine {
		DeskEngine::new(
			config,
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			AssetService::disabled(),
			EventBus::new(16),
		)
	}

	#[tokio::test]
	async fn test_seeded_users_can_place_orders() {
		let engine = engine(
			ConfigBuilder::new()
				.user(1, "Alice", Role::Customer)
				.user(5, "Tess", Role::Technician)
				.build(),
		);
		assert_eq!(engine.seed_users().await.unwrap(), 2);

		let order = engine
			.orders()
			.create(
				&Principal::customer(1),
				CreateOrderRequest {
					description: "Ombre".into(),
					quantity: 3,
					image_key: None,
				},
			)
			.await
			.unwrap();
		assert_eq!(order.customer_id, UserId(1));

		let unseeded = engine
			.orders()
			.create(
				&Principal::customer(2),
				CreateOrderRequest {
					description: "Ombre".into(),
					quantity: 3,
					image_key: None,
				},
			)
			.await;
		assert!(matches!(unseeded, Err(DeskError::UserNotFound(_))));
	}

	#[tokio::test]
	async fn test_run_until_stops_on_shutdown() {
		let engine = engine(ConfigBuilder::new().build());
		engine.run_until(async {}).await.unwrap();
	}
}
