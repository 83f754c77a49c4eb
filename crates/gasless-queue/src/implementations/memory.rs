//! In-process broker for tests and local runs.
//!
//! Each subscription is bound to one topic. Publishing records the payload
//! in a bounded per-topic history and enqueues a delivery on every bound
//! subscription. A pull
//! leases deliveries under fresh ack ids; ack retires a lease and nack puts
//! the message back at the head of the subscription.
//!
//! ```toml
//! [queue.implementations.memory]
//! bindings = { "gasless-deposits-push" = "gasless-deposits" }
//! ```

use crate::{QueueError, QueueInterface, ReceivedMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gasless_types::{ConfigSchema, Schema, ValidationError};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Payloads retained per topic for [`MemoryQueue::published_to`].
const PUBLISHED_HISTORY: usize = 1024;

#[derive(Default)]
struct QueueState {
	next_message_id: u64,
	next_ack_id: u64,
	published: HashMap<String, VecDeque<Vec<u8>>>,
	ready: HashMap<String, VecDeque<ReceivedMessage>>,
	leased: HashMap<String, HashMap<String, ReceivedMessage>>,
}

#[derive(Clone, Default)]
pub struct MemoryQueue {
	/// subscription -> topic
	bindings: HashMap<String, String>,
	state: Arc<Mutex<QueueState>>,
}

impl MemoryQueue {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_subscription(mut self, subscription: impl Into<String>, topic: impl Into<String>) -> Self {
		self.bindings.insert(subscription.into(), topic.into());
		self
	}

	/// Publishes with an explicit publish time.
	pub async fn publish_at(&self, topic: &str, payload: Vec<u8>, publish_time: DateTime<Utc>) -> String {
		let mut state = self.state.lock().await;
		state.next_message_id += 1;
		let message_id = state.next_message_id.to_string();

		let history = state.published.entry(topic.to_string()).or_default();
		if history.len() == PUBLISHED_HISTORY {
			history.pop_front();
		}
		history.push_back(payload.clone());

		for (subscription, bound_topic) in &self.bindings {
			if bound_topic == topic {
				state
					.ready
					.entry(subscription.clone())
					.or_default()
					.push_back(ReceivedMessage {
						ack_id: String::new(),
						message_id: message_id.clone(),
						data: payload.clone(),
						publish_time,
					});
			}
		}

		message_id
	}

	/// The most recent payloads published to `topic`, oldest first.
	pub async fn published_to(&self, topic: &str) -> Vec<Vec<u8>> {
		let state = self.state.lock().await;
		state
			.published
			.get(topic)
			.map(|history| history.iter().cloned().collect())
			.unwrap_or_default()
	}

	/// Messages on `subscription` that have not been acknowledged.
	pub async fn outstanding(&self, subscription: &str) -> usize {
		let state = self.state.lock().await;
		state.ready.get(subscription).map_or(0, VecDeque::len)
			+ state.leased.get(subscription).map_or(0, HashMap::len)
	}
}

#[async_trait]
impl QueueInterface for MemoryQueue {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryQueueSchema)
	}

	async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, QueueError> {
		Ok(self.publish_at(topic, payload, Utc::now()).await)
	}

	async fn pull(
		&self,
		subscription: &str,
		max_messages: u32,
	) -> Result<Vec<ReceivedMessage>, QueueError> {
		if !self.bindings.contains_key(subscription) {
			return Err(QueueError::Broker(format!(
				"Subscription not found: {}",
				subscription
			)));
		}

		let mut state = self.state.lock().await;
		let mut leased = Vec::new();
		while leased.len() < max_messages as usize {
			let Some(mut message) = state
				.ready
				.get_mut(subscription)
				.and_then(VecDeque::pop_front)
			else {
				break;
			};
			state.next_ack_id += 1;
			message.ack_id = format!("{}:{}", subscription, state.next_ack_id);
			leased.push(message);
		}

		let leases = state.leased.entry(subscription.to_string()).or_default();
		for message in &leased {
			leases.insert(message.ack_id.clone(), message.clone());
		}
		Ok(leased)
	}

	async fn acknowledge(&self, subscription: &str, ack_ids: &[String]) -> Result<(), QueueError> {
		let mut state = self.state.lock().await;
		if let Some(leases) = state.leased.get_mut(subscription) {
			for ack_id in ack_ids {
				leases.remove(ack_id);
			}
		}
		Ok(())
	}

	async fn nack(&self, subscription: &str, ack_id: &str) -> Result<(), QueueError> {
		let mut state = self.state.lock().await;
		let released = state
			.leased
			.get_mut(subscription)
			.and_then(|leases| leases.remove(ack_id));
		if let Some(message) = released {
			state
				.ready
				.entry(subscription.to_string())
				.or_default()
				.push_front(message);
		}
		Ok(())
	}
}

pub struct MemoryQueueSchema;

impl ConfigSchema for MemoryQueueSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)?;

		let Some(bindings) = config.get("bindings") else {
			return Ok(());
		};
		let table = bindings
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "bindings".to_string(),
				expected: "table".to_string(),
				actual: bindings.type_str().to_string(),
			})?;
		for (subscription, topic) in table {
			if !topic.is_str() {
				return Err(ValidationError::TypeMismatch {
					field: format!("bindings.{}", subscription),
					expected: "string".to_string(),
					actual: topic.type_str().to_string(),
				});
			}
		}
		Ok(())
	}
}

/// Factory function to create a memory queue from configuration.
pub fn create_queue(config: &toml::Value) -> Result<Box<dyn QueueInterface>, QueueError> {
	MemoryQueueSchema
		.validate(config)
		.map_err(|e| QueueError::Configuration(format!("Invalid configuration: {}", e)))?;

	let mut queue = MemoryQueue::new();
	if let Some(bindings) = config.get("bindings").and_then(|v| v.as_table()) {
		for (subscription, topic) in bindings {
			if let Some(topic) = topic.as_str() {
				queue = queue.with_subscription(subscription.clone(), topic);
			}
		}
	}
	Ok(Box::new(queue))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_lease_ack_nack_cycle() {
		let queue = MemoryQueue::new().with_subscription("sub", "topic");
		for i in 0..3u8 {
			queue.publish("topic", vec![i]).await.unwrap();
		}

		let first = queue.pull("sub", 2).await.unwrap();
		assert_eq!(first.len(), 2);
		assert_eq!(first[0].data, vec![0]);
		assert_ne!(first[0].ack_id, first[1].ack_id);

		queue
			.acknowledge("sub", &[first[0].ack_id.clone()])
			.await
			.unwrap();
		queue.nack("sub", &first[1].ack_id).await.unwrap();
		assert_eq!(queue.outstanding("sub").await, 2);

		let second = queue.pull("sub", 10).await.unwrap();
		assert_eq!(second.len(), 2);
		assert_eq!(second[0].data, vec![1]);
		assert_eq!(second[0].message_id, first[1].message_id);
		assert_ne!(second[0].ack_id, first[1].ack_id);
	}

	#[tokio::test]
	async fn test_unbound_topic_not_delivered() {
		let queue = MemoryQueue::new().with_subscription("sub", "topic");
		queue.publish("other", b"x".to_vec()).await.unwrap();
		assert!(queue.pull("sub", 10).await.unwrap().is_empty());
		assert_eq!(queue.published_to("other").await, vec![b"x".to_vec()]);
	}

	#[tokio::test]
	async fn test_published_history_is_bounded() {
		let queue = MemoryQueue::new();
		for i in 0..PUBLISHED_HISTORY + 5 {
			queue
				.publish("topic", (i as u32).to_be_bytes().to_vec())
				.await
				.unwrap();
		}

		let history = queue.published_to("topic").await;
		assert_eq!(history.len(), PUBLISHED_HISTORY);
		assert_eq!(history[0], 5u32.to_be_bytes().to_vec());
		assert_eq!(
			history.last(),
			Some(&((PUBLISHED_HISTORY + 4) as u32).to_be_bytes().to_vec())
		);
	}

	#[tokio::test]
	async fn test_unknown_subscription_errors() {
		let queue = MemoryQueue::new();
		assert!(matches!(
			queue.pull("missing", 1).await,
			Err(QueueError::Broker(_))
		));
	}

	#[tokio::test]
	async fn test_factory_reads_bindings() {
		let config = toml::Value::Table(toml::toml! {
			[bindings]
			sub = "topic"
		});
		let queue = create_queue(&config).unwrap();
		queue.publish("topic", b"x".to_vec()).await.unwrap();
		assert_eq!(queue.pull("sub", 1).await.unwrap().len(), 1);

		let bad = toml::Value::Table(toml::toml! { bindings = "sub" });
		assert!(create_queue(&bad).is_err());
	}
}
