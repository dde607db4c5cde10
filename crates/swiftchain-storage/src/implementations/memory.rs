//! In-memory storage backend.
//!
//! Nothing survives a restart. Entries honour their TTL so session contexts
//! expire the same way they do with the file backend.

use super::file::{ttl_schema_fields, TtlConfig};
use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use swiftchain_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry {
	value: Vec<u8>,
	expires_at: Option<Instant>,
}

impl Entry {
	fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.is_some_and(|at| now >= at)
	}
}

/// HashMap-backed storage.
pub struct MemoryStorage {
	store: Arc<RwLock<HashMap<String, Entry>>>,
	ttl_config: TtlConfig,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::with_ttl_config(TtlConfig::default())
	}

	pub fn with_ttl_config(ttl_config: TtlConfig) -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
			ttl_config,
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		match store.get(key) {
			Some(entry) if !entry.is_expired(Instant::now()) => Ok(entry.value.clone()),
			_ => Err(StorageError::NotFound),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let ttl = ttl.unwrap_or_else(|| self.ttl_config.ttl_for_key(key));
		let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);

		let mut store = self.store.write().await;
		store.insert(key.to_string(), Entry { value, expires_at });
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(store
			.get(key)
			.is_some_and(|entry| !entry.is_expired(Instant::now())))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let now = Instant::now();
		let mut store = self.store.write().await;
		let before = store.len();
		store.retain(|_, entry| !entry.is_expired(now));
		Ok(before - store.len())
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], ttl_schema_fields()).validate(config)
	}
}

/// Creates a memory backend.
///
/// Configuration parameters:
/// - `ttl_<namespace>`: optional expiry in seconds per namespace
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::with_ttl_config(
		TtlConfig::from_config(config),
	)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "transfers:records";
		let value = b"[]".to_vec();
		storage.set_bytes(key, value.clone(), None).await.unwrap();
		assert_eq!(storage.get_bytes(key).await.unwrap(), value);
		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());
		assert!(matches!(
			storage.get_bytes(key).await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_namespace_ttl_expires_entries() {
		let config: toml::Value = toml::from_str("ttl_sessions = 60").unwrap();
		let storage = MemoryStorage::with_ttl_config(TtlConfig::from_config(&config));

		storage.set_bytes("sessions:a", b"{}".to_vec(), None).await.unwrap();
		storage.set_bytes("transfers:records", b"[]".to_vec(), None).await.unwrap();

		tokio::time::advance(Duration::from_secs(61)).await;

		assert!(matches!(
			storage.get_bytes("sessions:a").await,
			Err(StorageError::NotFound)
		));
		assert!(storage.exists("transfers:records").await.unwrap());
		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
	}

	#[test]
	fn test_rejects_negative_ttl() {
		let config: toml::Value = toml::from_str("ttl_sessions = -1").unwrap();
		assert!(create_storage(&config).is_err());
	}
}
