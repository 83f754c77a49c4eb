//! Duplicate detection for the pull consumer.

use crate::ConsumerError;
use async_trait::async_trait;
use gasless_types::QueuedMessage;

/// Decides whether a pulled message has already been handled.
#[async_trait]
pub trait DuplicateDetector: Send + Sync {
	async fn is_duplicate(
		&self,
		message_id: &str,
		message: &QueuedMessage,
	) -> Result<bool, ConsumerError>;
}

/// Treats every message as new.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverDuplicate;

#[async_trait]
impl DuplicateDetector for NeverDuplicate {
	async fn is_duplicate(
		&self,
		_message_id: &str,
		_message: &QueuedMessage,
	) -> Result<bool, ConsumerError> {
		Ok(false)
	}
}
