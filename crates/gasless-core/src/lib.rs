//! Relay engine for gasless deposits.
//!
//! Wires the submission path (validate, verify and publish intents), the
//! push and pull consumers that drain the deposit queue, and the read side
//! of the pending-deposit cache. Backends are supplied through factories
//! keyed by implementation name, and each is selected by the `primary`
//! entry of its configuration section.

pub mod classify;
pub mod duplicate;
pub mod eip712;
pub mod error;
pub mod ingestion;
pub mod pending;
pub mod periphery;
pub mod pull;
pub mod reconcile;
pub mod submission;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ConsumerError, EngineError};

use classify::DeadLetterPolicy;
use duplicate::{DuplicateDetector, NeverDuplicate};
use gasless_cache::{CacheError, CacheInterface, CacheService};
use gasless_config::Config;
use gasless_indexer::{IndexerError, IndexerInterface, IndexerService};
use gasless_queue::{QueueError, QueueInterface, QueueService, QueueTopics};
use ingestion::IngestionService;
use pending::PendingDepositsReader;
use periphery::PeripheryRegistry;
use pull::PullConsumer;
use reconcile::Reconciler;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use submission::SubmissionService;
use tracing::info;

/// Shared relay components, built once at start-up.
pub struct RelayEngine {
	config: Config,
	submission: Arc<SubmissionService>,
	ingestion: Arc<IngestionService>,
	pull: Arc<PullConsumer>,
	reader: Arc<PendingDepositsReader>,
}

impl RelayEngine {
	pub fn new(
		config: Config,
		cache: Arc<CacheService>,
		queue: Arc<QueueService>,
		indexer: Arc<IndexerService>,
		detector: Arc<dyn DuplicateDetector>,
	) -> Self {
		let ttl = Duration::from_secs(config.relay.ttl_seconds);
		let policy = DeadLetterPolicy::new(config.relay.dead_letter_reasons.iter().copied());

		let submission = Arc::new(SubmissionService::new(
			queue.clone(),
			PeripheryRegistry::new(config.periphery.clone()),
		));
		let ingestion = Arc::new(IngestionService::new(
			cache.clone(),
			queue.clone(),
			indexer.clone(),
			config.api.push_secret.clone(),
			ttl,
			policy.clone(),
		));
		let pull = Arc::new(PullConsumer::new(
			queue,
			detector,
			ttl,
			config.queue.max_messages_per_pull,
			policy,
		));
		let reconciler = Arc::new(Reconciler::new(cache.clone(), indexer));
		let reader = Arc::new(PendingDepositsReader::new(cache, reconciler));

		Self {
			config,
			submission,
			ingestion,
			pull,
			reader,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn submission(&self) -> &Arc<SubmissionService> {
		&self.submission
	}

	pub fn ingestion(&self) -> &Arc<IngestionService> {
		&self.ingestion
	}

	pub fn pull_consumer(&self) -> &Arc<PullConsumer> {
		&self.pull
	}

	pub fn reader(&self) -> &Arc<PendingDepositsReader> {
		&self.reader
	}
}

// Type aliases for factory functions
type CacheFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn CacheInterface>, CacheError> + Send>;
type QueueFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn QueueInterface>, QueueError> + Send>;
type IndexerFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn IndexerInterface>, IndexerError> + Send>;

/// Builds a [`RelayEngine`] from configuration and named backend factories.
pub struct RelayEngineBuilder {
	config: Config,
	cache_factories: HashMap<String, CacheFactory>,
	queue_factories: HashMap<String, QueueFactory>,
	indexer_factories: HashMap<String, IndexerFactory>,
	detector: Option<Arc<dyn DuplicateDetector>>,
}

impl RelayEngineBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			cache_factories: HashMap::new(),
			queue_factories: HashMap::new(),
			indexer_factories: HashMap::new(),
			detector: None,
		}
	}

	pub fn with_cache_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn CacheInterface>, CacheError> + Send + 'static,
	{
		self.cache_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_queue_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn QueueInterface>, QueueError> + Send + 'static,
	{
		self.queue_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_indexer_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn IndexerInterface>, IndexerError> + Send + 'static,
	{
		self.indexer_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	/// Replaces the default detector, which treats every message as new.
	pub fn with_duplicate_detector(mut self, detector: Arc<dyn DuplicateDetector>) -> Self {
		self.detector = Some(detector);
		self
	}

	pub fn build(self) -> Result<RelayEngine, EngineError> {
		let config = self.config;

		// Create cache backend
		let cache_config = selected_config("cache", &config.cache.primary, config.cache.primary_config())?;
		let cache_factory = self.cache_factories.get(&config.cache.primary).ok_or_else(|| {
			EngineError::Config(format!("Unknown cache implementation: {}", config.cache.primary))
		})?;
		let cache_backend =
			cache_factory(cache_config).map_err(|e| EngineError::Service(e.to_string()))?;
		let cache = Arc::new(CacheService::new(cache_backend));

		// Create queue backend
		let queue_config = selected_config("queue", &config.queue.primary, config.queue.primary_config())?;
		let queue_factory = self.queue_factories.get(&config.queue.primary).ok_or_else(|| {
			EngineError::Config(format!("Unknown queue implementation: {}", config.queue.primary))
		})?;
		let queue_backend =
			queue_factory(queue_config).map_err(|e| EngineError::Service(e.to_string()))?;
		let queue = Arc::new(QueueService::new(
			queue_backend,
			QueueTopics {
				topic: config.queue.topic.clone(),
				dead_letter_topic: config.queue.dead_letter_topic.clone(),
				subscription: config.queue.subscription.clone(),
			},
		));

		// Create indexer backend
		let indexer_config = selected_config(
			"indexer",
			&config.indexer.primary,
			config.indexer.primary_config(),
		)?;
		let indexer_factory = self
			.indexer_factories
			.get(&config.indexer.primary)
			.ok_or_else(|| {
				EngineError::Config(format!(
					"Unknown indexer implementation: {}",
					config.indexer.primary
				))
			})?;
		let indexer_backend =
			indexer_factory(indexer_config).map_err(|e| EngineError::Service(e.to_string()))?;
		let indexer = Arc::new(IndexerService::new(indexer_backend));

		let detector: Arc<dyn DuplicateDetector> = match self.detector {
			Some(detector) => detector,
			None => Arc::new(NeverDuplicate),
		};

		info!(
			name = %config.relay.name,
			cache = %config.cache.primary,
			queue = %config.queue.primary,
			indexer = %config.indexer.primary,
			chains = config.periphery.len(),
			"relay engine built"
		);
		Ok(RelayEngine::new(config, cache, queue, indexer, detector))
	}
}

fn selected_config<'a>(
	section: &str,
	primary: &str,
	selected: Option<&'a toml::Value>,
) -> Result<&'a toml::Value, EngineError> {
	selected.ok_or_else(|| {
		EngineError::Config(format!(
			"{}.primary '{}' has no entry in {}.implementations",
			section, primary, section
		))
	})
}
