//! Push consumer: classifies one broker delivery and applies it to the cache.

use crate::classify::{decode_deposit, is_expired, DeadLetterPolicy};
use crate::ConsumerError;
use alloy::primitives::keccak256;
use chrono::{DateTime, Utc};
use gasless_cache::CacheService;
use gasless_indexer::IndexerService;
use gasless_queue::QueueService;
use gasless_types::{DepositStatus, DropReason, IngestResponse, PendingGaslessDeposit, PushEnvelope};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// How a push delivery was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
	/// Dropped without touching the cache.
	Dropped { reason: DropReason },
	/// The indexer knows the deposit; its pending entry was removed.
	Confirmed {
		deposit_id: String,
		status: DepositStatus,
	},
	/// Not yet indexed; the pending entry was written.
	Pending { deposit_id: String },
	/// The indexer could not answer. Nothing was written.
	IndexerUnavailable { deposit_id: String },
}

impl IngestOutcome {
	/// Whether the delivery should be acknowledged to the broker.
	pub fn acked(&self) -> bool {
		!matches!(self, IngestOutcome::IndexerUnavailable { .. })
	}

	pub fn reason(&self) -> &str {
		match self {
			IngestOutcome::Dropped { reason } => reason.as_str(),
			IngestOutcome::Confirmed { status, .. } => status.as_str(),
			IngestOutcome::Pending { .. } => "pending",
			IngestOutcome::IndexerUnavailable { .. } => "indexer_unavailable",
		}
	}

	pub fn deposit_id(&self) -> Option<&str> {
		match self {
			IngestOutcome::Dropped { .. } => None,
			IngestOutcome::Confirmed { deposit_id, .. }
			| IngestOutcome::Pending { deposit_id }
			| IngestOutcome::IndexerUnavailable { deposit_id } => Some(deposit_id),
		}
	}

	pub fn to_response(&self) -> IngestResponse {
		IngestResponse {
			status: if self.acked() { "acked" } else { "retry" }.to_string(),
			reason: self.reason().to_string(),
			deposit_id: self.deposit_id().map(str::to_string),
		}
	}
}

pub struct IngestionService {
	cache: Arc<CacheService>,
	queue: Arc<QueueService>,
	indexer: Arc<IndexerService>,
	push_secret: String,
	ttl: Duration,
	policy: DeadLetterPolicy,
}

impl IngestionService {
	pub fn new(
		cache: Arc<CacheService>,
		queue: Arc<QueueService>,
		indexer: Arc<IndexerService>,
		push_secret: String,
		ttl: Duration,
		policy: DeadLetterPolicy,
	) -> Self {
		Self {
			cache,
			queue,
			indexer,
			push_secret,
			ttl,
			policy,
		}
	}

	/// Checks the token the broker presented on the push request.
	/// Compares keccak digests of token and secret in constant time.
	pub fn authorize(&self, token: Option<&str>) -> bool {
		let Some(token) = token else {
			return false;
		};
		let presented = keccak256(token.as_bytes());
		let expected = keccak256(self.push_secret.as_bytes());
		presented
			.iter()
			.zip(expected.iter())
			.fold(0u8, |diff, (a, b)| diff | (a ^ b))
			== 0
	}

	/// Classifies one delivery and applies its cache effect.
	///
	/// `Ok` outcomes other than [`IngestOutcome::IndexerUnavailable`] are
	/// final and the delivery is acknowledged. `Err` means the cache or
	/// dead-letter topic failed and the broker should redeliver.
	#[instrument(skip(self, body, now))]
	pub async fn handle_push(
		&self,
		body: &[u8],
		now: DateTime<Utc>,
	) -> Result<IngestOutcome, ConsumerError> {
		let Some((envelope, payload)) = PushEnvelope::parse(body) else {
			warn!(len = body.len(), "dropping malformed push envelope");
			return self.drop_message(DropReason::Malformed, body.to_vec()).await;
		};
		let message_id = envelope.message.message_id;

		if is_expired(envelope.message.publish_time, now, self.ttl) {
			info!(
				message_id = %message_id,
				publish_time = %envelope.message.publish_time,
				ttl_secs = self.ttl.as_secs(),
				"dropping expired message"
			);
			return self.drop_message(DropReason::Expired, payload).await;
		}

		let Some(message) = decode_deposit(&payload) else {
			warn!(message_id = %message_id, "dropping undecodable message");
			return self.drop_message(DropReason::DecodeError, payload).await;
		};
		let deposit_id = message.deposit_id().to_string();
		let origin_chain_id = message.origin_chain_id();

		match self
			.indexer
			.deposit_status(origin_chain_id, &deposit_id)
			.await
		{
			Ok(Some(status)) => {
				self.cache.retire(&deposit_id).await?;
				info!(deposit_id = %deposit_id, status = %status, "deposit indexed, cleared pending entry");
				Ok(IngestOutcome::Confirmed { deposit_id, status })
			}
			Ok(None) => {
				let pending = PendingGaslessDeposit::from_queued(&message, message_id);
				self.cache.upsert_pending(&pending, self.ttl).await?;
				debug!(deposit_id = %deposit_id, "deposit not yet indexed, marked pending");
				Ok(IngestOutcome::Pending { deposit_id })
			}
			Err(e) => {
				warn!(deposit_id = %deposit_id, origin_chain_id, error = %e, "indexer unavailable, leaving message for redelivery");
				Ok(IngestOutcome::IndexerUnavailable { deposit_id })
			}
		}
	}

	async fn drop_message(
		&self,
		reason: DropReason,
		payload: Vec<u8>,
	) -> Result<IngestOutcome, ConsumerError> {
		if self.policy.should_dead_letter(reason) {
			self.queue.publish_dead_letter(payload).await?;
		}
		Ok(IngestOutcome::Dropped { reason })
	}
}
