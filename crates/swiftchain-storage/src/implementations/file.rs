//! File-based storage backend.
//!
//! Each namespace is a directory under `storage_path` and each entry a file in
//! it. Files start with a small header carrying the expiry time so the cleanup
//! task can drop expired sessions without parsing their bodies.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use swiftchain_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StorageKey, ValidationError,
};
use tokio::fs;

/// Entry header, 16 bytes:
/// - `[0..4]` magic `SWCH`
/// - `[4..6]` version, u16 little-endian
/// - `[6..14]` expiry, u64 little-endian Unix seconds, 0 means never
/// - `[14..16]` reserved
#[derive(Debug, Clone, Copy)]
struct EntryHeader {
	expires_at: u64,
}

impl EntryHeader {
	const MAGIC: &'static [u8; 4] = b"SWCH";
	const VERSION: u16 = 1;
	const SIZE: usize = 16;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			unix_now().saturating_add(ttl.as_secs())
		};
		Self { expires_at }
	}

	fn encode(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&Self::VERSION.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE || &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Missing entry header".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported entry version: {}",
				version
			)));
		}

		let mut expires = [0u8; 8];
		expires.copy_from_slice(&bytes[6..14]);
		Ok(Self {
			expires_at: u64::from_le_bytes(expires),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && unix_now() >= self.expires_at
	}
}

fn unix_now() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

/// Default expiry per namespace, read from `ttl_<namespace>` keys.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	pub fn from_config(config: &toml::Value) -> Self {
		let ttls = StorageKey::all()
			.filter_map(|key| {
				config
					.get(format!("ttl_{}", key.as_str()))
					.and_then(|v| v.as_integer())
					.and_then(|secs| u64::try_from(secs).ok())
					.map(|secs| (key, Duration::from_secs(secs)))
			})
			.collect();
		Self { ttls }
	}

	pub fn ttl(&self, key: StorageKey) -> Duration {
		self.ttls.get(&key).copied().unwrap_or(Duration::ZERO)
	}

	/// TTL of the namespace prefix of a `namespace:id` key.
	pub fn ttl_for_key(&self, key: &str) -> Duration {
		key.split(':')
			.next()
			.and_then(|ns| ns.parse::<StorageKey>().ok())
			.map(|ns| self.ttl(ns))
			.unwrap_or(Duration::ZERO)
	}
}

/// Optional `ttl_<namespace>` fields shared by both backends.
pub(crate) fn ttl_schema_fields() -> Vec<Field> {
	StorageKey::all()
		.map(|key| {
			Field::new(
				format!("ttl_{}", key.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			)
		})
		.collect()
}

pub struct FileStorage {
	base_path: PathBuf,
	ttl_config: TtlConfig,
}

impl FileStorage {
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	/// Maps `namespace:id` to `<base>/<namespace>/<id>.bin`.
	///
	/// Keys without a namespace land in `<base>/default`. Path separators and
	/// dots in the id are replaced so an id cannot escape its directory.
	fn entry_path(&self, key: &str) -> PathBuf {
		let (namespace, id) = key.split_once(':').unwrap_or(("default", key));
		let sanitize = |s: &str| s.replace(['/', '\\', ':', '.'], "_");
		self.base_path
			.join(sanitize(namespace))
			.join(format!("{}.bin", sanitize(id)))
	}

	async fn cleanup_dir(&self, dir: &Path) -> Result<usize, StorageError> {
		let mut removed = 0;
		let mut entries = match fs::read_dir(dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}

			let data = match fs::read(&path).await {
				Ok(data) => data,
				Err(e) => {
					tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
					continue;
				},
			};

			match EntryHeader::decode(&data) {
				Ok(header) if header.is_expired() => {
					if let Err(e) = fs::remove_file(&path).await {
						tracing::warn!(path = %path.display(), error = %e, "Failed to remove expired entry");
					} else {
						removed += 1;
					}
				},
				Ok(_) => {},
				Err(e) => {
					tracing::debug!(path = %path.display(), error = %e, "Skipping entry without header");
				},
			}
		}

		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let data = match fs::read(self.entry_path(key)).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(StorageError::NotFound)
			},
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = EntryHeader::decode(&data)?;
		if header.is_expired() {
			return Err(StorageError::NotFound);
		}
		Ok(data[EntryHeader::SIZE..].to_vec())
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.entry_path(key);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let ttl = ttl.unwrap_or_else(|| self.ttl_config.ttl_for_key(key));
		let mut file_data = Vec::with_capacity(EntryHeader::SIZE + value.len());
		file_data.extend_from_slice(&EntryHeader::new(ttl).encode());
		file_data.extend_from_slice(&value);

		// Write then rename so readers never see a partial entry
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.entry_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		match self.get_bytes(key).await {
			Ok(_) => Ok(true),
			Err(StorageError::NotFound) => Ok(false),
			Err(e) => Err(e),
		}
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		for namespace in StorageKey::all() {
			removed += self
				.cleanup_dir(&self.base_path.join(namespace.as_str()))
				.await?;
		}
		Ok(removed)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional = vec![Field::new("storage_path", FieldType::String)];
		optional.extend(ttl_schema_fields());
		Schema::new(vec![], optional).validate(config)
	}
}

/// Creates a file backend.
///
/// Configuration parameters:
/// - `storage_path`: base directory (default: "./data/storage")
/// - `ttl_transfers`, `ttl_sessions`: expiry in seconds, 0 keeps entries forever
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_entries_live_in_namespace_dirs() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf(), TtlConfig::default());

		storage
			.set_bytes("transfers:records", b"[1]".to_vec(), None)
			.await
			.unwrap();

		assert!(dir.path().join("transfers").join("records.bin").exists());
		assert_eq!(storage.get_bytes("transfers:records").await.unwrap(), b"[1]");
		assert!(matches!(
			storage.get_bytes("transfers:missing").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_id_cannot_escape_namespace() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf(), TtlConfig::default());

		let path = storage.entry_path("sessions:../../etc/passwd");
		assert!(path.starts_with(dir.path().join("sessions")));
	}

	#[tokio::test]
	async fn test_expired_entries_are_hidden_and_cleaned() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf(), TtlConfig::default());

		// Write an entry whose expiry is already in the past
		let path = storage.entry_path("sessions:old");
		fs::create_dir_all(path.parent().unwrap()).await.unwrap();
		let mut data = EntryHeader { expires_at: 1 }.encode().to_vec();
		data.extend_from_slice(b"{}");
		fs::write(&path, data).await.unwrap();

		storage
			.set_bytes("sessions:fresh", b"{}".to_vec(), Some(Duration::from_secs(3600)))
			.await
			.unwrap();

		assert!(!storage.exists("sessions:old").await.unwrap());
		assert!(storage.exists("sessions:fresh").await.unwrap());
		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
		assert!(!path.exists());
	}

	#[test]
	fn test_ttl_config_reads_namespaces() {
		let config: toml::Value = toml::from_str("ttl_sessions = 1800").unwrap();
		let ttl = TtlConfig::from_config(&config);
		assert_eq!(ttl.ttl_for_key("sessions:abc"), Duration::from_secs(1800));
		assert_eq!(ttl.ttl_for_key("transfers:records"), Duration::ZERO);
	}

	#[test]
	fn test_schema_rejects_wrong_types() {
		let config: toml::Value = toml::from_str("storage_path = 5").unwrap();
		assert!(create_storage(&config).is_err());
	}
}
