//! Read side of the pending-deposit cache.

use crate::reconcile::Reconciler;
use gasless_cache::{CacheError, CacheService};
use gasless_types::PendingGaslessDeposit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub struct PendingDepositsReader {
	cache: Arc<CacheService>,
	reconciler: Arc<Reconciler>,
	cleanup_running: Arc<AtomicBool>,
}

impl PendingDepositsReader {
	pub fn new(cache: Arc<CacheService>, reconciler: Arc<Reconciler>) -> Self {
		Self {
			cache,
			reconciler,
			cleanup_running: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Every deposit in the pending set whose record is still live, oldest
	/// submission first.
	pub async fn list_pending(&self) -> Result<Vec<PendingGaslessDeposit>, CacheError> {
		let ids = self.cache.pending_ids().await?;
		let mut deposits = self.cache.load_pending(&ids).await?;
		deposits.sort_by(|a, b| {
			a.submitted_at
				.cmp(&b.submitted_at)
				.then_with(|| a.deposit_id.cmp(&b.deposit_id))
		});
		debug!(members = ids.len(), live = deposits.len(), "listed pending deposits");
		Ok(deposits)
	}

	/// Starts a background reconciliation pass unless one is already
	/// running. Failures are logged and never reach the caller.
	pub fn schedule_cleanup(&self) -> Option<JoinHandle<()>> {
		if self
			.cleanup_running
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			debug!("cleanup already running");
			return None;
		}

		let reconciler = self.reconciler.clone();
		let running = self.cleanup_running.clone();
		Some(tokio::spawn(async move {
			if let Err(e) = reconciler.run().await {
				error!(error = %e, "pending deposit cleanup failed");
			}
			running.store(false, Ordering::Release);
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::queued_message;
	use chrono::{Duration as ChronoDuration, Utc};
	use gasless_cache::implementations::memory::MemoryCache;
	use gasless_indexer::implementations::memory::MemoryIndexer;
	use gasless_indexer::IndexerService;
	use gasless_types::DepositStatus;
	use std::time::Duration;

	fn reader() -> (PendingDepositsReader, Arc<CacheService>, MemoryIndexer) {
		let cache = Arc::new(CacheService::new(Box::new(MemoryCache::new())));
		let indexer = MemoryIndexer::new();
		let reconciler = Arc::new(Reconciler::new(
			cache.clone(),
			Arc::new(IndexerService::new(Box::new(indexer.clone()))),
		));
		(
			PendingDepositsReader::new(cache.clone(), reconciler),
			cache,
			indexer,
		)
	}

	fn deposit(id: &str, age_secs: i64) -> PendingGaslessDeposit {
		let mut message = queued_message(id);
		message.submitted_at = Utc::now() - ChronoDuration::seconds(age_secs);
		PendingGaslessDeposit::from_queued(&message, format!("m-{}", id))
	}

	#[tokio::test]
	async fn test_lists_live_deposits_oldest_first() {
		let (reader, cache, _) = reader();
		let ttl = Duration::from_secs(300);
		cache.upsert_pending(&deposit("new", 5), ttl).await.unwrap();
		cache.upsert_pending(&deposit("old", 60), ttl).await.unwrap();
		cache
			.upsert_pending(&deposit("gone", 90), Duration::from_millis(10))
			.await
			.unwrap();
		tokio::time::sleep(Duration::from_millis(30)).await;

		let listed: Vec<String> = reader
			.list_pending()
			.await
			.unwrap()
			.into_iter()
			.map(|d| d.deposit_id)
			.collect();
		assert_eq!(listed, vec!["old".to_string(), "new".to_string()]);
	}

	#[tokio::test]
	async fn test_cleanup_runs_in_background() {
		let (reader, cache, indexer) = reader();
		cache
			.upsert_pending(&deposit("1", 0), Duration::from_secs(300))
			.await
			.unwrap();
		indexer.set_status(10, "1", DepositStatus::Filled).await;

		let handle = reader.schedule_cleanup().unwrap();
		handle.await.unwrap();
		assert!(cache.pending_ids().await.unwrap().is_empty());

		assert!(reader.schedule_cleanup().is_some());
	}

	#[tokio::test]
	async fn test_overlapping_cleanup_skipped() {
		let (reader, _, _) = reader();
		reader.cleanup_running.store(true, Ordering::Release);
		assert!(reader.schedule_cleanup().is_none());
	}
}
