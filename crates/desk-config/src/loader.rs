//! Configuration loader for multi-file configurations.
//!
//! A configuration file may pull in other files with `include`. Sections are
//! merged at the top level only, and a section defined in two files is an
//! error rather than a silent override.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Configuration loader that handles multi-file configurations with includes.
pub struct ConfigLoader {
	/// Base path for resolving relative includes
	base_path: PathBuf,
	/// Canonical paths already read, used to detect include cycles
	loaded_files: HashSet<PathBuf>,
	/// Which file each top-level section came from, for error reporting
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	/// Creates a new ConfigLoader with the given base path.
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and all its includes.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;

		let main_content = self.load_file(&config_path).await?;
		let mut main_toml: toml::Value = toml::from_str(&main_content)?;

		let includes = Self::extract_includes(&main_toml)?;
		if includes.is_empty() {
			return main_content.parse();
		}

		if let Some(table) = main_toml.as_table_mut() {
			table.remove("include");
			for key in table.keys() {
				self.section_sources.insert(key.clone(), config_path.clone());
			}
		}

		for include in includes {
			let include_path = self.resolve_path(&include)?;
			let include_content = self.load_file(&include_path).await?;
			let include_toml: toml::Value = toml::from_str(&include_content)?;
			self.merge_sections(&mut main_toml, include_toml, &include_path)?;
		}

		let combined = toml::to_string(&main_toml).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		combined.parse()
	}

	/// Reads a file once, resolving environment variables.
	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical_path = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	/// Reads the `include` directive, which may be a string or an array of strings.
	fn extract_includes(toml: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
		match toml.get("include") {
			None => Ok(Vec::new()),
			Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
			Some(toml::Value::Array(items)) => items
				.iter()
				.map(|item| {
					item.as_str().map(PathBuf::from).ok_or_else(|| {
						ConfigError::Validation("Include array must contain only strings".into())
					})
				})
				.collect(),
			Some(_) => Err(ConfigError::Validation(
				"Include must be a string or array of strings".into(),
			)),
		}
	}

	/// Moves the sections of an included file into the main table.
	fn merge_sections(
		&mut self,
		main_toml: &mut toml::Value,
		include_toml: toml::Value,
		include_path: &Path,
	) -> Result<(), ConfigError> {
		let toml::Value::Table(include_table) = include_toml else {
			return Ok(());
		};
		let Some(main_table) = main_toml.as_table_mut() else {
			return Ok(());
		};

		for (key, value) in include_table {
			if let Some(existing) = self.section_sources.get(&key) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}. \
					Each top-level section must be unique across all configuration files.",
					key,
					existing.display(),
					include_path.display()
				)));
			}
			self.section_sources
				.insert(key.clone(), include_path.to_path_buf());
			main_table.insert(key, value);
		}

		Ok(())
	}

	/// Resolves a path relative to the base path and checks that it exists.
	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_single_file_config() {
		let temp_dir = TempDir::new().unwrap();
		let config_content = r#"
[desk]
id = "single"

[storage]
primary = "memory"
[storage.implementations.memory]
"#;
		fs::write(temp_dir.path().join("config.toml"), config_content).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let config = loader.load_config("config.toml").await.unwrap();
		assert_eq!(config.desk.id, "single");
	}

	#[tokio::test]
	async fn test_config_with_includes() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["storage.toml", "users.toml"]

[desk]
id = "split"
"#;
		let storage_config = r#"
[storage]
primary = "file"
[storage.implementations.file]
storage_path = "./data"
"#;
		let users_config = r#"
[[users]]
id = 1
name = "Alice"
role = "customer"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("storage.toml"), storage_config).unwrap();
		fs::write(temp_dir.path().join("users.toml"), users_config).unwrap();

		let config = Config::from_file(temp_dir.path().join("main.toml").to_str().unwrap())
			.await
			.unwrap();

		assert_eq!(config.desk.id, "split");
		assert_eq!(config.storage.primary, "file");
		assert_eq!(config.users.len(), 1);
	}

	#[tokio::test]
	async fn test_duplicate_section_error() {
		let temp_dir = TempDir::new().unwrap();

		let main_config = r#"
include = ["duplicate.toml"]

[desk]
id = "first"
"#;
		let duplicate_config = r#"
[desk]
id = "second"
"#;

		fs::write(temp_dir.path().join("main.toml"), main_config).unwrap();
		fs::write(temp_dir.path().join("duplicate.toml"), duplicate_config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader
			.load_config("main.toml")
			.await
			.unwrap_err()
			.to_string();
		assert!(error_msg.contains("Duplicate section 'desk'"));
	}

	#[tokio::test]
	async fn test_self_include_detection() {
		let temp_dir = TempDir::new().unwrap();
		let config = r#"
include = "self.toml"

[desk]
id = "loop"
"#;
		fs::write(temp_dir.path().join("self.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader
			.load_config("self.toml")
			.await
			.unwrap_err()
			.to_string();
		assert!(error_msg.contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include_reported() {
		let temp_dir = TempDir::new().unwrap();
		let config = r#"
include = ["nowhere.toml"]

[desk]
id = "lost"
"#;
		fs::write(temp_dir.path().join("main.toml"), config).unwrap();

		let mut loader = ConfigLoader::new(temp_dir.path());
		let error_msg = loader
			.load_config("main.toml")
			.await
			.unwrap_err()
			.to_string();
		assert!(error_msg.contains("Configuration file not found"));
	}
}
