//! File-based storage backend implementation.
//!
//! Each record is one JSON file at `<base>/<namespace>/<id>.json`. Writes go
//! to a temporary file that is renamed into place, so readers always observe
//! either the old or the new value. Every write to a key happens while an
//! exclusive `fs2` lock on the key's `.lock` file is held, which is what makes
//! compare-and-swap atomic across tasks and processes.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use desk_types::ImplementationRegistry;
use fs2::FileExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
}

impl FileStorage {
	/// Creates a new FileStorage rooted at `base_path`.
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Makes an id or namespace safe to use as a single path component.
	fn sanitize(component: &str) -> String {
		component.replace(['/', '\\', ':', '.'], "_")
	}

	/// Converts a `namespace:id` key to its record path.
	fn get_file_path(&self, key: &str) -> PathBuf {
		match key.split_once(':') {
			Some((namespace, id)) => self
				.base_path
				.join(Self::sanitize(namespace))
				.join(format!("{}.json", Self::sanitize(id))),
			None => self.base_path.join(format!("{}.json", Self::sanitize(key))),
		}
	}

	/// Performs a locked write on a blocking thread.
	///
	/// The write is skipped (and `Ok(false)` returned) when `expected` is
	/// `Some(..)` and does not match what is on disk.
	async fn locked_write(
		&self,
		path: PathBuf,
		expected: Option<Option<Vec<u8>>>,
		value: Vec<u8>,
	) -> Result<bool, StorageError> {
		tokio::task::spawn_blocking(move || write_under_lock(&path, expected, &value))
			.await
			.map_err(|e| StorageError::Backend(format!("storage task failed: {}", e)))?
	}
}

/// Blocking body of [`FileStorage::locked_write`].
fn write_under_lock(
	path: &Path,
	expected: Option<Option<Vec<u8>>>,
	value: &[u8],
) -> Result<bool, StorageError> {
	let backend = |e: std::io::Error| StorageError::Backend(e.to_string());

	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).map_err(backend)?;
	}

	let lock_path = path.with_extension("lock");
	let lock_file = std::fs::OpenOptions::new()
		.create(true)
		.truncate(false)
		.write(true)
		.open(&lock_path)
		.map_err(backend)?;
	lock_file.lock_exclusive().map_err(backend)?;

	let result = (|| {
		if let Some(expected) = expected {
			let current = match std::fs::read(path) {
				Ok(bytes) => Some(bytes),
				Err(e) if e.kind() == ErrorKind::NotFound => None,
				Err(e) => return Err(backend(e)),
			};
			if current != expected {
				return Ok(false);
			}
		}

		let temp_path = path.with_extension("tmp");
		std::fs::write(&temp_path, value).map_err(backend)?;
		std::fs::rename(&temp_path, path).map_err(backend)?;
		Ok(true)
	})();

	if let Err(e) = FileExt::unlock(&lock_file) {
		tracing::warn!("Failed to release lock {:?}: {}", lock_path, e);
	}

	result
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let path = self.get_file_path(key);

		match fs::read(&path).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.get_file_path(key);
		self.locked_write(path, None, value).await.map(|_| ())
	}

	async fn compare_and_swap(
		&self,
		key: &str,
		expected: Option<&[u8]>,
		value: Vec<u8>,
	) -> Result<bool, StorageError> {
		let path = self.get_file_path(key);
		self.locked_write(path, Some(expected.map(<[u8]>::to_vec)), value)
			.await
	}

	async fn scan(&self, namespace: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let dir = self.base_path.join(Self::sanitize(namespace));
		let mut entries = match fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let mut records = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("json")) {
				continue;
			}
			let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
				continue;
			};

			match fs::read(&path).await {
				Ok(data) => records.push((format!("{}:{}", namespace, id), data)),
				// renamed away between listing and reading
				Err(e) if e.kind() == ErrorKind::NotFound => {},
				Err(e) => return Err(StorageError::Backend(e.to_string())),
			}
		}

		Ok(records)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = match config.get("storage_path") {
		Some(value) => value.as_str().ok_or_else(|| {
			StorageError::Configuration("storage_path must be a string".into())
		})?,
		None => "./data/storage",
	};

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
