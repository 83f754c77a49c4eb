//! Pull consumer: leases a batch from the subscription and returns the
//! deposits worth processing. Never writes to the cache.

use crate::classify::{decode_deposit, is_expired, DeadLetterPolicy};
use crate::duplicate::DuplicateDetector;
use crate::ConsumerError;
use chrono::{DateTime, Utc};
use gasless_queue::{QueueService, ReceivedMessage};
use gasless_types::{DropReason, QueuedMessage};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedDeposit {
	pub message_id: String,
	pub publish_time: DateTime<Utc>,
	pub message: QueuedMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullBatch {
	pub deposits: Vec<AcceptedDeposit>,
	pub acked: usize,
	pub nacked: usize,
	pub dropped: usize,
}

enum Disposition {
	Accept(AcceptedDeposit),
	Drop(DropReason),
}

pub struct PullConsumer {
	queue: Arc<QueueService>,
	detector: Arc<dyn DuplicateDetector>,
	ttl: Duration,
	max_messages: u32,
	policy: DeadLetterPolicy,
}

impl PullConsumer {
	pub fn new(
		queue: Arc<QueueService>,
		detector: Arc<dyn DuplicateDetector>,
		ttl: Duration,
		max_messages: u32,
		policy: DeadLetterPolicy,
	) -> Self {
		Self {
			queue,
			detector,
			ttl,
			max_messages,
			policy,
		}
	}

	/// Runs one pull pass.
	///
	/// Dropped and accepted messages are acknowledged together in one call
	/// after the loop. A message whose handling fails is nacked instead and
	/// does not stop the pass. A failed acknowledgement is returned as an
	/// error once the nacks have been sent.
	#[instrument(skip(self, now))]
	pub async fn collect(&self, now: DateTime<Utc>) -> Result<PullBatch, ConsumerError> {
		let received = self.queue.pull(self.max_messages).await?;
		debug!(count = received.len(), "pulled messages");

		let mut batch = PullBatch::default();
		let mut ack_ids = Vec::new();
		let mut nack_ids = Vec::new();

		for message in received {
			match self.classify(&message, now).await {
				Ok(Disposition::Accept(deposit)) => {
					ack_ids.push(message.ack_id);
					batch.deposits.push(deposit);
				}
				Ok(Disposition::Drop(reason)) => {
					debug!(message_id = %message.message_id, reason = %reason, "dropping pulled message");
					ack_ids.push(message.ack_id);
					batch.dropped += 1;
				}
				Err(e) => {
					warn!(message_id = %message.message_id, error = %e, "failed to process pulled message");
					nack_ids.push(message.ack_id);
				}
			}
		}

		let ack_result = self.queue.acknowledge(&ack_ids).await;
		if let Err(e) = &ack_result {
			error!(count = ack_ids.len(), error = %e, "failed to acknowledge pulled messages");
		}

		for ack_id in &nack_ids {
			if let Err(e) = self.queue.nack(ack_id).await {
				warn!(ack_id = %ack_id, error = %e, "failed to nack message");
			}
		}

		ack_result?;
		batch.acked = ack_ids.len();
		batch.nacked = nack_ids.len();
		info!(
			accepted = batch.deposits.len(),
			dropped = batch.dropped,
			nacked = batch.nacked,
			"pull pass complete"
		);
		Ok(batch)
	}

	async fn classify(
		&self,
		received: &ReceivedMessage,
		now: DateTime<Utc>,
	) -> Result<Disposition, ConsumerError> {
		let Some(message) = decode_deposit(&received.data) else {
			return self.drop_message(DropReason::DecodeError, received).await;
		};

		if is_expired(received.publish_time, now, self.ttl) {
			return self.drop_message(DropReason::Expired, received).await;
		}

		if self
			.detector
			.is_duplicate(&received.message_id, &message)
			.await?
		{
			return self.drop_message(DropReason::Duplicate, received).await;
		}

		Ok(Disposition::Accept(AcceptedDeposit {
			message_id: received.message_id.clone(),
			publish_time: received.publish_time,
			message,
		}))
	}

	async fn drop_message(
		&self,
		reason: DropReason,
		received: &ReceivedMessage,
	) -> Result<Disposition, ConsumerError> {
		if self.policy.should_dead_letter(reason) {
			self.queue.publish_dead_letter(received.data.clone()).await?;
		}
		Ok(Disposition::Drop(reason))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::duplicate::NeverDuplicate;
	use crate::test_support::queued_payload;
	use async_trait::async_trait;
	use chrono::Duration as ChronoDuration;
	use gasless_queue::implementations::memory::MemoryQueue;
	use gasless_queue::{MockQueueInterface, QueueError, QueueInterface, QueueTopics};
	use mockall::predicate::eq;

	const TTL: Duration = Duration::from_secs(300);

	fn topics() -> QueueTopics {
		QueueTopics {
			topic: "deposits".to_string(),
			dead_letter_topic: "deposits-dlt".to_string(),
			subscription: "deposits-sub".to_string(),
		}
	}

	fn consumer(queue: &MemoryQueue, detector: Arc<dyn DuplicateDetector>) -> PullConsumer {
		PullConsumer::new(
			Arc::new(QueueService::new(Box::new(queue.clone()), topics())),
			detector,
			TTL,
			10,
			DeadLetterPolicy::default(),
		)
	}

	fn memory_queue() -> MemoryQueue {
		MemoryQueue::new().with_subscription("deposits-sub", "deposits")
	}

	/// Flags one message id as a duplicate and fails on another.
	struct ScriptedDetector {
		duplicate: String,
		failing: String,
	}

	#[async_trait]
	impl DuplicateDetector for ScriptedDetector {
		async fn is_duplicate(
			&self,
			message_id: &str,
			_message: &QueuedMessage,
		) -> Result<bool, ConsumerError> {
			if message_id == self.failing {
				return Err(ConsumerError::Detector("lookup failed".to_string()));
			}
			Ok(message_id == self.duplicate)
		}
	}

	#[tokio::test]
	async fn test_classifies_batch() {
		let queue = memory_queue();
		let now = Utc::now();
		queue.publish_at("deposits", queued_payload("1"), now).await;
		queue.publish_at("deposits", b"junk".to_vec(), now).await;
		let stale = queued_payload("3");
		queue
			.publish_at("deposits", stale.clone(), now - ChronoDuration::seconds(301))
			.await;
		queue.publish_at("deposits", queued_payload("4"), now).await;

		let batch = consumer(&queue, Arc::new(NeverDuplicate))
			.collect(now)
			.await
			.unwrap();

		let ids: Vec<&str> = batch.deposits.iter().map(|d| d.message.deposit_id()).collect();
		assert_eq!(ids, vec!["1", "4"]);
		assert_eq!(batch.dropped, 2);
		assert_eq!(batch.acked, 4);
		assert_eq!(batch.nacked, 0);
		assert_eq!(queue.outstanding("deposits-sub").await, 0);
		assert_eq!(queue.published_to("deposits-dlt").await, vec![stale]);
	}

	#[tokio::test]
	async fn test_detector_failure_nacks_only_that_message() {
		let queue = memory_queue();
		let now = Utc::now();
		let first = queue.publish_at("deposits", queued_payload("1"), now).await;
		let second = queue.publish_at("deposits", queued_payload("2"), now).await;
		queue.publish_at("deposits", queued_payload("3"), now).await;

		let detector = ScriptedDetector {
			duplicate: first,
			failing: second.clone(),
		};
		let batch = consumer(&queue, Arc::new(detector))
			.collect(now)
			.await
			.unwrap();

		let ids: Vec<&str> = batch.deposits.iter().map(|d| d.message.deposit_id()).collect();
		assert_eq!(ids, vec!["3"]);
		assert_eq!(batch.dropped, 1);
		assert_eq!(batch.nacked, 1);

		let redelivered = queue.pull("deposits-sub", 10).await.unwrap();
		assert_eq!(redelivered.len(), 1);
		assert_eq!(redelivered[0].message_id, second);
	}

	#[tokio::test]
	async fn test_empty_pull_makes_no_ack_call() {
		let mut backend = MockQueueInterface::new();
		backend
			.expect_pull()
			.with(eq("deposits-sub"), eq(10u32))
			.returning(|_, _| Ok(Vec::new()));
		backend.expect_acknowledge().never();

		let consumer = PullConsumer::new(
			Arc::new(QueueService::new(Box::new(backend), topics())),
			Arc::new(NeverDuplicate),
			TTL,
			10,
			DeadLetterPolicy::default(),
		);
		assert_eq!(consumer.collect(Utc::now()).await.unwrap(), PullBatch::default());
	}

	#[tokio::test]
	async fn test_ack_failure_still_sends_nacks() {
		let now = Utc::now();
		let good = queued_payload("1");
		let stale = queued_payload("2");
		let mut backend = MockQueueInterface::new();
		backend.expect_pull().returning(move |_, _| {
			Ok(vec![
				ReceivedMessage {
					ack_id: "a-1".to_string(),
					message_id: "m-1".to_string(),
					data: good.clone(),
					publish_time: now,
				},
				ReceivedMessage {
					ack_id: "a-2".to_string(),
					message_id: "m-2".to_string(),
					data: stale.clone(),
					publish_time: now - ChronoDuration::seconds(400),
				},
			])
		});
		backend
			.expect_publish()
			.with(eq("deposits-dlt"), mockall::predicate::always())
			.times(1)
			.returning(|_, _| Err(QueueError::Broker("unavailable".to_string())));
		backend
			.expect_acknowledge()
			.times(1)
			.returning(|_, ids| {
				assert_eq!(ids, ["a-1".to_string()]);
				Err(QueueError::Network("timeout".to_string()))
			});
		backend
			.expect_nack()
			.with(eq("deposits-sub"), eq("a-2"))
			.times(1)
			.returning(|_, _| Ok(()));

		let consumer = PullConsumer::new(
			Arc::new(QueueService::new(Box::new(backend), topics())),
			Arc::new(NeverDuplicate),
			TTL,
			10,
			DeadLetterPolicy::default(),
		);
		assert!(matches!(
			consumer.collect(now).await,
			Err(ConsumerError::Queue(QueueError::Network(_)))
		));
	}

	#[tokio::test]
	async fn test_dead_letter_failure_nacks_message() {
		let now = Utc::now();
		let stale = queued_payload("1");
		let mut backend = MockQueueInterface::new();
		backend.expect_pull().returning(move |_, _| {
			Ok(vec![ReceivedMessage {
				ack_id: "a-1".to_string(),
				message_id: "m-1".to_string(),
				data: stale.clone(),
				publish_time: now - ChronoDuration::seconds(400),
			}])
		});
		backend
			.expect_publish()
			.with(eq("deposits-dlt"), mockall::predicate::always())
			.returning(|_, _| Err(QueueError::Broker("unavailable".to_string())));
		backend.expect_acknowledge().never();
		backend
			.expect_nack()
			.with(eq("deposits-sub"), eq("a-1"))
			.times(1)
			.returning(|_, _| Ok(()));

		let consumer = PullConsumer::new(
			Arc::new(QueueService::new(Box::new(backend), topics())),
			Arc::new(NeverDuplicate),
			TTL,
			10,
			DeadLetterPolicy::default(),
		);
		let batch = consumer.collect(now).await.unwrap();
		assert!(batch.deposits.is_empty());
		assert_eq!(batch.nacked, 1);
	}
}
