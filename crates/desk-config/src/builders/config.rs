//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, particularly useful for testing scenarios.

use crate::{ApiConfig, AssetsConfig, Config, DeskConfig, StorageConfig, UserSeed};
use desk_types::{Role, UserId};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to in-memory storage, no API section, no asset resolver and no users.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	desk_id: String,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	assets: Option<AssetsConfig>,
	api: Option<ApiConfig>,
	users: Vec<UserSeed>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			"memory".to_string(),
			toml::Value::Table(toml::map::Map::new()),
		);
		Self {
			desk_id: "test-desk".to_string(),
			storage_primary: "memory".to_string(),
			storage_implementations,
			assets: None,
			api: None,
			users: Vec::new(),
		}
	}

	/// Sets the desk ID.
	pub fn desk_id(mut self, id: impl Into<String>) -> Self {
		self.desk_id = id.into();
		self
	}

	/// Switches the primary storage to the file backend rooted at `path`.
	pub fn file_storage(mut self, path: impl Into<String>) -> Self {
		let mut table = toml::map::Map::new();
		table.insert("storage_path".into(), toml::Value::String(path.into()));
		self.storage_implementations
			.insert("file".to_string(), toml::Value::Table(table));
		self.storage_primary = "file".to_string();
		self
	}

	/// Configures the static asset resolver with the given base URL.
	pub fn static_assets(mut self, base_url: impl Into<String>) -> Self {
		let mut table = toml::map::Map::new();
		table.insert("base_url".into(), toml::Value::String(base_url.into()));
		let mut implementations = HashMap::new();
		implementations.insert("static".to_string(), toml::Value::Table(table));
		self.assets = Some(AssetsConfig {
			primary: "static".to_string(),
			implementations,
		});
		self
	}

	/// Sets the API configuration.
	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Adds a user profile to seed.
	pub fn user(mut self, id: u64, name: impl Into<String>, role: Role) -> Self {
		self.users.push(UserSeed {
			id: UserId(id),
			name: name.into(),
			role,
		});
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			desk: DeskConfig { id: self.desk_id },
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
			},
			assets: self.assets,
			api: self.api,
			users: self.users,
		}
	}
}
