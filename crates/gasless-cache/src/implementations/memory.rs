//! In-process cache backend for tests and local runs.
//!
//! Records and sets share one lock, so the tracked upsert/delete operations
//! are atomic with respect to every other operation on the same instance.
//! Expired records are filtered on read and purged on the next write.

use crate::{CacheError, CacheInterface};
use async_trait::async_trait;
use gasless_types::{ConfigSchema, Schema, ValidationError};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CacheEntry {
	value: Vec<u8>,
	expires_at: Instant,
}

impl CacheEntry {
	fn is_expired(&self, now: Instant) -> bool {
		now >= self.expires_at
	}
}

#[derive(Default)]
struct MemoryState {
	entries: HashMap<String, CacheEntry>,
	sets: HashMap<String, HashSet<String>>,
}

impl MemoryState {
	fn live(&self, key: &str) -> Option<&CacheEntry> {
		self.entries
			.get(key)
			.filter(|entry| !entry.is_expired(Instant::now()))
	}

	fn purge_expired(&mut self) {
		let now = Instant::now();
		self.entries.retain(|_, entry| !entry.is_expired(now));
	}
}

pub struct MemoryCache {
	state: RwLock<MemoryState>,
}

impl MemoryCache {
	pub fn new() -> Self {
		Self {
			state: RwLock::new(MemoryState::default()),
		}
	}
}

impl Default for MemoryCache {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl CacheInterface for MemoryCache {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, CacheError> {
		let state = self.state.read().await;
		state
			.live(key)
			.map(|entry| entry.value.clone())
			.ok_or_else(|| CacheError::NotFound(key.to_string()))
	}

	async fn get_batch(&self, keys: &[String]) -> Result<Vec<(String, Vec<u8>)>, CacheError> {
		let state = self.state.read().await;
		Ok(keys
			.iter()
			.filter_map(|key| {
				state
					.live(key)
					.map(|entry| (key.clone(), entry.value.clone()))
			})
			.collect())
	}

	async fn exists(&self, key: &str) -> Result<bool, CacheError> {
		Ok(self.state.read().await.live(key).is_some())
	}

	async fn set_members(&self, set_key: &str) -> Result<Vec<String>, CacheError> {
		let state = self.state.read().await;
		Ok(state
			.sets
			.get(set_key)
			.map(|members| members.iter().cloned().collect())
			.unwrap_or_default())
	}

	async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), CacheError> {
		let mut state = self.state.write().await;
		if let Some(members) = state.sets.get_mut(set_key) {
			members.remove(member);
		}
		Ok(())
	}

	async fn upsert_tracked(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Duration,
		set_key: &str,
		member: &str,
	) -> Result<(), CacheError> {
		let mut state = self.state.write().await;
		state.purge_expired();
		state.entries.insert(
			key.to_string(),
			CacheEntry {
				value,
				expires_at: Instant::now() + ttl,
			},
		);
		state
			.sets
			.entry(set_key.to_string())
			.or_default()
			.insert(member.to_string());
		Ok(())
	}

	async fn delete_tracked(
		&self,
		key: &str,
		set_key: &str,
		member: &str,
	) -> Result<(), CacheError> {
		let mut state = self.state.write().await;
		state.purge_expired();
		state.entries.remove(key);
		if let Some(members) = state.sets.get_mut(set_key) {
			members.remove(member);
		}
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryCacheSchema)
	}
}

pub struct MemoryCacheSchema;

impl ConfigSchema for MemoryCacheSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory cache backend from configuration.
pub fn create_cache(config: &toml::Value) -> Result<Box<dyn CacheInterface>, CacheError> {
	MemoryCacheSchema
		.validate(config)
		.map_err(|e| CacheError::Configuration(format!("Invalid configuration: {}", e)))?;
	Ok(Box::new(MemoryCache::new()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_tracked_write_and_delete() {
		let cache = MemoryCache::new();
		cache
			.upsert_tracked("k", b"v".to_vec(), Duration::from_secs(60), "set", "m")
			.await
			.unwrap();

		assert_eq!(cache.get_bytes("k").await.unwrap(), b"v");
		assert_eq!(cache.set_members("set").await.unwrap(), vec!["m".to_string()]);

		cache.delete_tracked("k", "set", "m").await.unwrap();
		assert!(matches!(cache.get_bytes("k").await, Err(CacheError::NotFound(_))));
		assert!(cache.set_members("set").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_batch_skips_missing() {
		let cache = MemoryCache::new();
		cache
			.upsert_tracked("a", b"1".to_vec(), Duration::from_secs(60), "set", "a")
			.await
			.unwrap();

		let found = cache
			.get_batch(&["a".to_string(), "b".to_string()])
			.await
			.unwrap();
		assert_eq!(found, vec![("a".to_string(), b"1".to_vec())]);
		assert!(cache.get_batch(&[]).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_entries_expire() {
		let cache = MemoryCache::new();
		cache
			.upsert_tracked("k", b"v".to_vec(), Duration::from_millis(5), "set", "m")
			.await
			.unwrap();
		tokio::time::sleep(Duration::from_millis(20)).await;

		assert!(!cache.exists("k").await.unwrap());
		assert_eq!(cache.set_members("set").await.unwrap(), vec!["m".to_string()]);
	}

	#[test]
	fn test_factory_accepts_empty_table() {
		let config = toml::Value::Table(toml::map::Map::new());
		assert!(create_cache(&config).is_ok());
	}
}
