//! Registers every backend implementation the relay ships with.

use gasless_cache::implementations::{memory as memory_cache, redis as redis_cache};
use gasless_config::Config;
use gasless_core::RelayEngineBuilder;
use gasless_indexer::implementations::{across, memory as memory_indexer};
use gasless_queue::implementations::{memory as memory_queue, pubsub};

/// Returns a builder with the cache, queue and indexer factories registered
/// under the names used in `primary`.
pub fn engine_builder(config: Config) -> RelayEngineBuilder {
	let subscription = config.queue.subscription.clone();
	let topic = config.queue.topic.clone();

	RelayEngineBuilder::new(config)
		.with_cache_factory("redis", redis_cache::create_cache)
		.with_cache_factory("memory", memory_cache::create_cache)
		.with_queue_factory("pubsub", pubsub::create_queue)
		.with_queue_factory("memory", move |config| {
			memory_queue::create_queue(&bind_subscription(config, &subscription, &topic))
		})
		.with_indexer_factory("across", across::create_indexer)
		.with_indexer_factory("memory", memory_indexer::create_indexer)
}

/// Binds the configured subscription to the deposit topic unless the
/// memory queue table already names a binding for it.
fn bind_subscription(config: &toml::Value, subscription: &str, topic: &str) -> toml::Value {
	let mut config = config.clone();
	if let Some(table) = config.as_table_mut() {
		let bindings = table
			.entry("bindings")
			.or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
		if let Some(bindings) = bindings.as_table_mut() {
			bindings
				.entry(subscription)
				.or_insert_with(|| toml::Value::String(topic.to_string()));
		}
	}
	config
}
