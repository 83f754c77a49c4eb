//! Message queue abstraction for deposit intents.
//!
//! The broker is treated as a black box that offers publish to a topic,
//! batch pull from a subscription, per-message acknowledgement and negative
//! acknowledgement. Push delivery does not go through this crate; the broker
//! posts to the ingest endpoint directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gasless_types::ConfigSchema;
use thiserror::Error;
use tracing::{debug, info};

pub mod implementations {
	pub mod memory;
	pub mod pubsub;
}

#[derive(Debug, Error)]
pub enum QueueError {
	#[error("Network error: {0}")]
	Network(String),
	#[error("Broker error: {0}")]
	Broker(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A message leased from a subscription by a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
	/// Handle used to ack or nack this delivery.
	pub ack_id: String,
	pub message_id: String,
	pub data: Vec<u8>,
	pub publish_time: DateTime<Utc>,
}

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait QueueInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Publishes one message and returns the broker-assigned message id.
	async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, QueueError>;

	/// Leases up to `max_messages` messages. May return fewer, including none.
	async fn pull(
		&self,
		subscription: &str,
		max_messages: u32,
	) -> Result<Vec<ReceivedMessage>, QueueError>;

	async fn acknowledge(&self, subscription: &str, ack_ids: &[String]) -> Result<(), QueueError>;

	/// Makes a leased message immediately available for redelivery.
	async fn nack(&self, subscription: &str, ack_id: &str) -> Result<(), QueueError>;
}

/// Names the relay publishes to and consumes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueTopics {
	pub topic: String,
	pub dead_letter_topic: String,
	pub subscription: String,
}

/// Routes relay traffic to the configured topics and subscription.
pub struct QueueService {
	backend: Box<dyn QueueInterface>,
	topics: QueueTopics,
}

impl QueueService {
	pub fn new(backend: Box<dyn QueueInterface>, topics: QueueTopics) -> Self {
		Self { backend, topics }
	}

	pub fn topics(&self) -> &QueueTopics {
		&self.topics
	}

	pub async fn publish_deposit(&self, payload: Vec<u8>) -> Result<String, QueueError> {
		let message_id = self.backend.publish(&self.topics.topic, payload).await?;
		debug!(topic = %self.topics.topic, message_id = %message_id, "published deposit intent");
		Ok(message_id)
	}

	/// Forwards a payload unchanged to the dead-letter topic.
	pub async fn publish_dead_letter(&self, payload: Vec<u8>) -> Result<String, QueueError> {
		let message_id = self
			.backend
			.publish(&self.topics.dead_letter_topic, payload)
			.await?;
		info!(topic = %self.topics.dead_letter_topic, message_id = %message_id, "dead-lettered message");
		Ok(message_id)
	}

	pub async fn pull(&self, max_messages: u32) -> Result<Vec<ReceivedMessage>, QueueError> {
		self.backend
			.pull(&self.topics.subscription, max_messages)
			.await
	}

	/// Acknowledges a batch. An empty batch makes no broker call.
	pub async fn acknowledge(&self, ack_ids: &[String]) -> Result<(), QueueError> {
		if ack_ids.is_empty() {
			return Ok(());
		}
		self.backend
			.acknowledge(&self.topics.subscription, ack_ids)
			.await
	}

	pub async fn nack(&self, ack_id: &str) -> Result<(), QueueError> {
		self.backend.nack(&self.topics.subscription, ack_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryQueue;

	fn topics() -> QueueTopics {
		QueueTopics {
			topic: "deposits".to_string(),
			dead_letter_topic: "deposits-dlt".to_string(),
			subscription: "deposits-sub".to_string(),
		}
	}

	#[tokio::test]
	async fn test_routes_to_configured_topics() {
		let queue = MemoryQueue::new().with_subscription("deposits-sub", "deposits");
		let handle = queue.clone();
		let service = QueueService::new(Box::new(queue), topics());

		service.publish_deposit(b"intent".to_vec()).await.unwrap();
		service.publish_dead_letter(b"stale".to_vec()).await.unwrap();

		assert_eq!(handle.published_to("deposits").await, vec![b"intent".to_vec()]);
		assert_eq!(handle.published_to("deposits-dlt").await, vec![b"stale".to_vec()]);

		let pulled = service.pull(10).await.unwrap();
		assert_eq!(pulled.len(), 1);
		assert_eq!(pulled[0].data, b"intent");
	}

	#[tokio::test]
	async fn test_empty_ack_is_noop() {
		let service = QueueService::new(Box::new(MemoryQueue::new()), topics());
		assert!(service.acknowledge(&[]).await.is_ok());
	}
}
