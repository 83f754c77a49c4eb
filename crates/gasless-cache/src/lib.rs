//! Shared cache for pending gasless deposits.
//!
//! The cache is the system of record for deposits that have been queued but
//! not yet seen by the indexer. Each deposit lives under its own key with a
//! TTL, and its id is mirrored in a set so readers can enumerate them.
//! Writers always touch the key and the set together in one atomic backend
//! operation.

use async_trait::async_trait;
use gasless_types::{ConfigSchema, PendingGaslessDeposit};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub mod implementations {
	pub mod memory;
	pub mod redis;
}

/// Set holding the id of every pending deposit.
pub const PENDING_SET_KEY: &str = "gasless:pending";

/// Prefix of the per-deposit record key.
pub const DEPOSIT_KEY_PREFIX: &str = "gasless:deposit:";

pub fn deposit_key(deposit_id: &str) -> String {
	format!("{}{}", DEPOSIT_KEY_PREFIX, deposit_id)
}

#[derive(Debug, Error)]
pub enum CacheError {
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level operations a cache backend must provide.
#[async_trait]
pub trait CacheInterface: Send + Sync {
	/// Returns the value under `key`, or `NotFound` if absent or expired.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, CacheError>;

	/// Returns `(key, value)` for every key that is present; missing keys are skipped.
	async fn get_batch(&self, keys: &[String]) -> Result<Vec<(String, Vec<u8>)>, CacheError>;

	async fn exists(&self, key: &str) -> Result<bool, CacheError>;

	async fn set_members(&self, set_key: &str) -> Result<Vec<String>, CacheError>;

	async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), CacheError>;

	/// Writes `key` with `ttl` and adds `member` to `set_key` atomically.
	async fn upsert_tracked(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Duration,
		set_key: &str,
		member: &str,
	) -> Result<(), CacheError>;

	/// Deletes `key` and removes `member` from `set_key` atomically.
	async fn delete_tracked(&self, key: &str, set_key: &str, member: &str)
		-> Result<(), CacheError>;

	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Pending-deposit view over a cache backend.
pub struct CacheService {
	backend: Box<dyn CacheInterface>,
}

impl CacheService {
	pub fn new(backend: Box<dyn CacheInterface>) -> Self {
		Self { backend }
	}

	/// Creates or refreshes the entry for a deposit and marks it pending.
	pub async fn upsert_pending(
		&self,
		deposit: &PendingGaslessDeposit,
		ttl: Duration,
	) -> Result<(), CacheError> {
		let bytes =
			serde_json::to_vec(deposit).map_err(|e| CacheError::Serialization(e.to_string()))?;
		self.backend
			.upsert_tracked(
				&deposit_key(&deposit.deposit_id),
				bytes,
				ttl,
				PENDING_SET_KEY,
				&deposit.deposit_id,
			)
			.await?;
		debug!(deposit_id = %deposit.deposit_id, ttl_secs = ttl.as_secs(), "upserted pending deposit");
		Ok(())
	}

	/// Drops a deposit from the pending view. Removing an absent deposit is not an error.
	pub async fn retire(&self, deposit_id: &str) -> Result<(), CacheError> {
		self.backend
			.delete_tracked(&deposit_key(deposit_id), PENDING_SET_KEY, deposit_id)
			.await?;
		debug!(deposit_id = %deposit_id, "retired pending deposit");
		Ok(())
	}

	pub async fn pending_ids(&self) -> Result<Vec<String>, CacheError> {
		self.backend.set_members(PENDING_SET_KEY).await
	}

	/// Resolves deposit ids to their records. Ids whose record has expired
	/// are absent from the result; undecodable records are skipped.
	pub async fn load_pending(
		&self,
		deposit_ids: &[String],
	) -> Result<Vec<PendingGaslessDeposit>, CacheError> {
		let keys: Vec<String> = deposit_ids.iter().map(|id| deposit_key(id)).collect();
		let found = self.backend.get_batch(&keys).await?;

		let mut deposits = Vec::with_capacity(found.len());
		for (key, bytes) in found {
			match serde_json::from_slice::<PendingGaslessDeposit>(&bytes) {
				Ok(deposit) => deposits.push(deposit),
				Err(e) => warn!(key = %key, error = %e, "skipping undecodable pending deposit"),
			}
		}
		Ok(deposits)
	}

	pub async fn get_pending(&self, deposit_id: &str) -> Result<PendingGaslessDeposit, CacheError> {
		let bytes = self.backend.get_bytes(&deposit_key(deposit_id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| CacheError::Serialization(e.to_string()))
	}

	pub async fn is_tracked(&self, deposit_id: &str) -> Result<bool, CacheError> {
		self.backend.exists(&deposit_key(deposit_id)).await
	}

	/// Removes a set member whose record is already gone.
	pub async fn prune_member(&self, deposit_id: &str) -> Result<(), CacheError> {
		self.backend.set_remove(PENDING_SET_KEY, deposit_id).await
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::implementations::memory::MemoryCache;
	use chrono::Utc;
	use gasless_types::Address;

	pub fn deposit(id: &str) -> PendingGaslessDeposit {
		PendingGaslessDeposit {
			deposit_id: id.to_string(),
			origin_chain_id: 10,
			destination_chain_id: 42161,
			witness_type: "BridgeWitness".to_string(),
			depositor: Address::repeat_byte(0x11),
			recipient: "0x1111111111111111111111111111111111111111".to_string(),
			input_token: Address::repeat_byte(0x22),
			output_token: "0x3333333333333333333333333333333333333333".to_string(),
			input_amount: "1000000".to_string(),
			output_amount: "990000".to_string(),
			fill_deadline: 1_700_003_600,
			integrator_id: None,
			submitted_at: Utc::now(),
			request_id: format!("req-{}", id),
			message_id: format!("msg-{}", id),
		}
	}

	#[test]
	fn test_key_layout() {
		assert_eq!(deposit_key("42"), "gasless:deposit:42");
		assert_eq!(PENDING_SET_KEY, "gasless:pending");
	}

	#[tokio::test]
	async fn test_upsert_and_load() {
		let service = CacheService::new(Box::new(MemoryCache::new()));
		service
			.upsert_pending(&deposit("1"), Duration::from_secs(300))
			.await
			.unwrap();
		service
			.upsert_pending(&deposit("2"), Duration::from_secs(300))
			.await
			.unwrap();

		let mut ids = service.pending_ids().await.unwrap();
		ids.sort();
		assert_eq!(ids, vec!["1".to_string(), "2".to_string()]);

		let loaded = service.load_pending(&ids).await.unwrap();
		assert_eq!(loaded.len(), 2);
		let first = loaded.iter().find(|d| d.deposit_id == "1").cloned().unwrap();
		assert_eq!(service.get_pending("1").await.unwrap(), first);
	}

	#[tokio::test]
	async fn test_upsert_is_idempotent() {
		let service = CacheService::new(Box::new(MemoryCache::new()));
		let record = deposit("7");
		for _ in 0..3 {
			service
				.upsert_pending(&record, Duration::from_secs(300))
				.await
				.unwrap();
		}
		assert_eq!(service.pending_ids().await.unwrap(), vec!["7".to_string()]);
		assert_eq!(service.get_pending("7").await.unwrap(), record);
	}

	#[tokio::test]
	async fn test_retire_removes_key_and_member() {
		let service = CacheService::new(Box::new(MemoryCache::new()));
		service
			.upsert_pending(&deposit("9"), Duration::from_secs(300))
			.await
			.unwrap();
		service.retire("9").await.unwrap();
		service.retire("9").await.unwrap();

		assert!(service.pending_ids().await.unwrap().is_empty());
		assert!(!service.is_tracked("9").await.unwrap());
		assert!(matches!(
			service.get_pending("9").await,
			Err(CacheError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_expired_record_absent_but_member_remains() {
		let service = CacheService::new(Box::new(MemoryCache::new()));
		service
			.upsert_pending(&deposit("3"), Duration::from_millis(10))
			.await
			.unwrap();
		tokio::time::sleep(Duration::from_millis(30)).await;

		let ids = service.pending_ids().await.unwrap();
		assert_eq!(ids, vec!["3".to_string()]);
		assert!(service.load_pending(&ids).await.unwrap().is_empty());

		service.prune_member("3").await.unwrap();
		assert!(service.pending_ids().await.unwrap().is_empty());
	}
}
