//! Reconciles the pending set against the cache and the indexer.

use gasless_cache::{CacheError, CacheService};
use gasless_indexer::IndexerService;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
	/// Set members whose record had already expired.
	pub pruned: usize,
	/// Deposits the indexer now knows about.
	pub retired: usize,
	pub pending: usize,
	/// Deposits the indexer could not answer for.
	pub skipped: usize,
}

pub struct Reconciler {
	cache: Arc<CacheService>,
	indexer: Arc<IndexerService>,
}

impl Reconciler {
	pub fn new(cache: Arc<CacheService>, indexer: Arc<IndexerService>) -> Self {
		Self { cache, indexer }
	}

	/// One cleanup pass.
	///
	/// A member whose record is missing is re-checked right before removal,
	/// so an ingestion that raced this pass keeps its membership.
	pub async fn run(&self) -> Result<ReconcileReport, CacheError> {
		let ids = self.cache.pending_ids().await?;
		let deposits = self.cache.load_pending(&ids).await?;
		let mut report = ReconcileReport::default();

		for id in &ids {
			if deposits.iter().any(|d| &d.deposit_id == id) {
				continue;
			}
			if self.cache.is_tracked(id).await? {
				continue;
			}
			self.cache.prune_member(id).await?;
			debug!(deposit_id = %id, "pruned expired pending member");
			report.pruned += 1;
		}

		for deposit in &deposits {
			match self
				.indexer
				.deposit_status(deposit.origin_chain_id, &deposit.deposit_id)
				.await
			{
				Ok(Some(status)) => {
					self.cache.retire(&deposit.deposit_id).await?;
					debug!(deposit_id = %deposit.deposit_id, status = %status, "retired indexed deposit");
					report.retired += 1;
				}
				Ok(None) => report.pending += 1,
				Err(e) => {
					warn!(deposit_id = %deposit.deposit_id, error = %e, "indexer lookup failed during cleanup");
					report.skipped += 1;
				}
			}
		}

		if report.pruned > 0 || report.retired > 0 {
			info!(
				pruned = report.pruned,
				retired = report.retired,
				pending = report.pending,
				"reconciled pending deposits"
			);
		}
		Ok(report)
	}
}
