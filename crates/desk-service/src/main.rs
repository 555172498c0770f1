//! Main entry point for the order desk service.
//!
//! This binary wires the desk engine to its storage backend and asset
//! resolver, seeds the configured users, and serves the HTTP API next to
//! the event consumer loop.

use clap::Parser;
use desk_config::Config;
use desk_core::{DeskBuilder, DeskEngine, DeskFactories};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the desk service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the desk service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the desk engine and seeds users
/// 5. Runs the engine (and the API when enabled) until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order desk");

	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Config path is not valid UTF-8: {}", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.desk.id);

	let engine = build_engine(config.clone())?;
	engine.seed_users().await?;
	let engine = Arc::new(engine);

	match config.enabled_api().cloned() {
		Some(api_config) => {
			let api_engine = Arc::clone(&engine);

			let engine_task = engine.run();
			let api_task = server::start_server(api_config, api_engine);

			tokio::select! {
				result = engine_task => {
					tracing::info!("Desk engine finished");
					result?;
				}
				result = api_task => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("Starting desk engine only");
			engine.run().await?;
		},
	}

	tracing::info!("Stopped order desk");
	Ok(())
}

/// Collects a registry listing into a factory map keyed by implementation name.
fn factory_map<F>(implementations: Vec<(&'static str, F)>) -> HashMap<String, F> {
	implementations
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect()
}

/// Builds the desk engine with every registered storage backend and asset
/// resolver.
fn build_engine(config: Config) -> Result<DeskEngine, Box<dyn std::error::Error>> {
	let factories = DeskFactories {
		storage_factories: factory_map(desk_storage::get_all_implementations()),
		asset_factories: factory_map(desk_core::assets::get_all_implementations()),
	};

	Ok(DeskBuilder::new(config).build(factories)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use desk_config::builders::config::ConfigBuilder;
	use desk_types::{CreateOrderRequest, Principal, Role};
	use tempfile::tempdir;

	#[test]
	fn test_args_parse() {
		let args = Args::parse_from(["desk", "--config", "desk.toml", "-l", "debug"]);
		assert_eq!(args.config, PathBuf::from("desk.toml"));
		assert_eq!(args.log_level, "debug");

		let args = Args::parse_from(["desk"]);
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_factory_maps_cover_registries() {
		let storage = factory_map(desk_storage::get_all_implementations());
		assert_eq!(storage.len(), 2);
		assert!(storage.contains_key("memory"));
		assert!(storage.contains_key("file"));

		let assets = factory_map(desk_core::assets::get_all_implementations());
		assert_eq!(assets.len(), 1);
		assert!(assets.contains_key("static"));
	}

	#[tokio::test]
	async fn test_build_engine_with_assets() {
		let config = ConfigBuilder::new()
			.desk_id("test-desk")
			.static_assets("https://cdn.test/")
			.user(1, "Alice", Role::Customer)
			.build();

		let engine = build_engine(config).unwrap();
		assert_eq!(engine.config().desk.id, "test-desk");
		assert_eq!(engine.seed_users().await.unwrap(), 1);

		let order = engine
			.orders()
			.create(
				&Principal::customer(1),
				CreateOrderRequest {
					description: "French tips".into(),
					quantity: 1,
					image_key: Some("designs/french.png".into()),
				},
			)
			.await
			.unwrap();
		let response = engine.assets().order_response(order).await;
		assert_eq!(
			response.image_url.as_deref(),
			Some("https://cdn.test/designs/french.png")
		);
	}

	#[test]
	fn test_build_engine_rejects_unknown_storage() {
		let mut config = ConfigBuilder::new().build();
		config.storage.primary = "postgres".into();
		config
			.storage
			.implementations
			.insert("postgres".into(), toml::Value::Table(toml::map::Map::new()));

		assert!(build_engine(config).is_err());
	}

	#[tokio::test]
	async fn test_build_engine_from_file_config() {
		let temp_dir = tempdir().expect("Failed to create temp dir");
		let config_path = temp_dir.path().join("desk.toml");
		let storage_path = temp_dir.path().join("data");

		let config_content = format!(
			r#"
[desk]
id = "file-desk"

[storage]
primary = "file"

[storage.implementations.file]
storage_path = "{}"

[api]
enabled = true
port = 3100
default_page_size = 20

[[users]]
id = 1
name = "Alice"
role = "customer"

[[users]]
id = 10
name = "Tina"
role = "technician"
"#,
			storage_path.display()
		);
		std::fs::write(&config_path, config_content).expect("Failed to write config");

		let config = Config::from_file(config_path.to_str().unwrap())
			.await
			.expect("Failed to load config");
		assert_eq!(config.desk.id, "file-desk");
		assert_eq!(config.enabled_api().map(|api| api.port), Some(3100));
		assert_eq!(config.users.len(), 2);

		let engine = build_engine(config).unwrap();
		assert_eq!(engine.seed_users().await.unwrap(), 2);
	}
}
