//! In-process indexer with preset answers, for tests and local runs.

use crate::{IndexerError, IndexerInterface};
use async_trait::async_trait;
use gasless_types::{ConfigSchema, DepositStatus, Schema, ValidationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct IndexerState {
	statuses: HashMap<(u64, String), DepositStatus>,
	unavailable: bool,
}

/// Clones share state, so a test can keep a handle after boxing one copy.
#[derive(Clone, Default)]
pub struct MemoryIndexer {
	state: Arc<RwLock<IndexerState>>,
}

impl MemoryIndexer {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn set_status(&self, origin_chain_id: u64, deposit_id: &str, status: DepositStatus) {
		self.state
			.write()
			.await
			.statuses
			.insert((origin_chain_id, deposit_id.to_string()), status);
	}

	/// While unavailable, every lookup fails.
	pub async fn set_unavailable(&self, unavailable: bool) {
		self.state.write().await.unavailable = unavailable;
	}
}

#[async_trait]
impl IndexerInterface for MemoryIndexer {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryIndexerSchema)
	}

	async fn deposit_status(
		&self,
		origin_chain_id: u64,
		deposit_id: &str,
	) -> Result<Option<DepositStatus>, IndexerError> {
		let state = self.state.read().await;
		if state.unavailable {
			return Err(IndexerError::Network("memory indexer unavailable".to_string()));
		}
		Ok(state
			.statuses
			.get(&(origin_chain_id, deposit_id.to_string()))
			.cloned())
	}
}

pub struct MemoryIndexerSchema;

impl ConfigSchema for MemoryIndexerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create an empty memory indexer.
pub fn create_indexer(config: &toml::Value) -> Result<Box<dyn IndexerInterface>, IndexerError> {
	MemoryIndexerSchema
		.validate(config)
		.map_err(|e| IndexerError::Configuration(format!("Invalid configuration: {}", e)))?;
	Ok(Box::new(MemoryIndexer::new()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_preset_statuses() {
		let indexer = MemoryIndexer::new();
		assert_eq!(indexer.deposit_status(10, "1").await.unwrap(), None);

		indexer.set_status(10, "1", DepositStatus::Expired).await;
		assert_eq!(
			indexer.deposit_status(10, "1").await.unwrap(),
			Some(DepositStatus::Expired)
		);
		assert_eq!(indexer.deposit_status(8453, "1").await.unwrap(), None);

		indexer.set_unavailable(true).await;
		assert!(indexer.deposit_status(10, "1").await.is_err());
	}
}
