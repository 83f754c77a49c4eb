//! Decode and age checks shared by the push and pull consumers.

use chrono::{DateTime, Utc};
use gasless_types::{DropReason, QueuedMessage};
use std::collections::HashSet;
use std::time::Duration;

/// A message is expired once its age strictly exceeds `ttl`. Messages
/// stamped in the future are never expired.
pub fn is_expired(publish_time: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
	let age_ms = now.signed_duration_since(publish_time).num_milliseconds();
	age_ms > 0 && age_ms as u128 > ttl.as_millis()
}

/// Decodes a queue payload into a deposit record. Returns `None` when the
/// bytes are not one, including a record with an empty deposit id or a zero
/// origin chain.
pub fn decode_deposit(payload: &[u8]) -> Option<QueuedMessage> {
	let message: QueuedMessage = serde_json::from_slice(payload).ok()?;
	if message.deposit_id().trim().is_empty() || message.origin_chain_id() == 0 {
		return None;
	}
	Some(message)
}

/// Which drop reasons also forward the payload to the dead-letter topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterPolicy {
	reasons: HashSet<DropReason>,
}

impl DeadLetterPolicy {
	pub fn new(reasons: impl IntoIterator<Item = DropReason>) -> Self {
		Self {
			reasons: reasons.into_iter().collect(),
		}
	}

	pub fn should_dead_letter(&self, reason: DropReason) -> bool {
		self.reasons.contains(&reason)
	}
}

impl Default for DeadLetterPolicy {
	fn default() -> Self {
		Self::new([DropReason::Expired])
	}
}
