//! Read-only deposit status lookups against the bridge indexer.

use async_trait::async_trait;
use gasless_types::{ConfigSchema, DepositStatus};
use thiserror::Error;

pub mod implementations {
	pub mod across;
	pub mod memory;
}

#[derive(Debug, Error)]
pub enum IndexerError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Indexer returned status {status}: {message}")]
	Status { status: u16, message: String },
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait IndexerInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Looks up a deposit. `Ok(None)` means the indexer has no record of it
	/// yet; an error means the indexer could not answer.
	async fn deposit_status(
		&self,
		origin_chain_id: u64,
		deposit_id: &str,
	) -> Result<Option<DepositStatus>, IndexerError>;
}

pub struct IndexerService {
	backend: Box<dyn IndexerInterface>,
}

impl IndexerService {
	pub fn new(backend: Box<dyn IndexerInterface>) -> Self {
		Self { backend }
	}

	pub async fn deposit_status(
		&self,
		origin_chain_id: u64,
		deposit_id: &str,
	) -> Result<Option<DepositStatus>, IndexerError> {
		self.backend
			.deposit_status(origin_chain_id, deposit_id)
			.await
	}
}
