//! Configuration module for the order desk.
//!
//! This module provides structures and utilities for managing desk
//! configuration. It supports loading configuration from TOML files and
//! validates that every referenced implementation is actually configured.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files for better organization:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}

use desk_types::{Role, UserId, MAX_PAGE_LIMIT};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the order desk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this desk instance.
	pub desk: DeskConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for image URL resolution. Absent means no image URLs.
	#[serde(default)]
	pub assets: Option<AssetsConfig>,
	/// Configuration for the HTTP API server.
	#[serde(default)]
	pub api: Option<ApiConfig>,
	/// User profiles seeded into the store at startup.
	#[serde(default)]
	pub users: Vec<UserSeed>,
}

/// Configuration specific to the desk instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeskConfig {
	/// Identifier of this desk instance, used in logs.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for image URL resolution.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetsConfig {
	/// Which resolver implementation to use.
	pub primary: String,
	/// Map of resolver implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// A user profile to seed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserSeed {
	pub id: UserId,
	pub name: String,
	pub role: Role,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// Page size used by list endpoints when the request gives none.
	#[serde(default = "default_page_size")]
	pub default_page_size: u32,
	/// CORS configuration.
	pub cors: Option<CorsConfig>,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			host: default_api_host(),
			port: default_api_port(),
			timeout_seconds: default_api_timeout(),
			max_request_size: default_max_request_size(),
			default_page_size: default_page_size(),
			cors: None,
		}
	}
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS; `"*"` allows any origin.
	#[serde(default)]
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

/// 1MB request bodies are far above anything the order API accepts.
fn default_max_request_size() -> usize {
	1024 * 1024
}

fn default_page_size() -> u32 {
	desk_types::DEFAULT_PAGE_LIMIT
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut resolved = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		resolved.push_str(&input[last_end..full_match.start()]);
		resolved.push_str(&value);
		last_end = full_match.end();
	}
	resolved.push_str(&input[last_end..]);

	Ok(resolved)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	///
	/// Each top-level section must be unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Returns the API configuration when the server is enabled.
	pub fn enabled_api(&self) -> Option<&ApiConfig> {
		self.api.as_ref().filter(|api| api.enabled)
	}

	/// Validates cross-references and ranges that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.desk.id.trim().is_empty() {
			return Err(ConfigError::Validation("Desk ID cannot be empty".into()));
		}

		// Validate storage config
		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}

		// Validate assets config
		if let Some(ref assets) = self.assets {
			if !assets.implementations.contains_key(&assets.primary) {
				return Err(ConfigError::Validation(format!(
					"Primary asset resolver '{}' not found in implementations",
					assets.primary
				)));
			}
		}

		// Validate API config
		if let Some(ref api) = self.api {
			if api.default_page_size == 0 || api.default_page_size > MAX_PAGE_LIMIT {
				return Err(ConfigError::Validation(format!(
					"api.default_page_size must be between 1 and {}",
					MAX_PAGE_LIMIT
				)));
			}
			if api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"api.timeout_seconds must be greater than 0".into(),
				));
			}
		}

		// Validate seeded users
		let mut seen = HashSet::new();
		for user in &self.users {
			if !seen.insert(user.id) {
				return Err(ConfigError::Validation(format!(
					"Duplicate user id {} in [[users]]",
					user.id
				)));
			}
			if user.name.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"User {} must have a name",
					user.id
				)));
			}
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
