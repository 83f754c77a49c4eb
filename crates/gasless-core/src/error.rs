use gasless_cache::CacheError;
use gasless_queue::QueueError;
use thiserror::Error;

/// Infrastructure failure while consuming a queued message. The message is
/// left unacknowledged so the broker redelivers it.
#[derive(Debug, Error)]
pub enum ConsumerError {
	#[error("Cache error: {0}")]
	Cache(#[from] CacheError),
	#[error("Queue error: {0}")]
	Queue(#[from] QueueError),
	#[error("Duplicate detector error: {0}")]
	Detector(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}
