//! Redis cache backend.
//!
//! Records are plain string keys written with `SET EX`; the pending set is a
//! Redis set. Tracked writes and deletes run as a `MULTI`/`EXEC` pipeline so
//! the record and its set membership never diverge through a partial write.
//! Divergence through TTL expiry is expected and repaired by reconciliation.
//!
//! ```toml
//! [cache.implementations.redis]
//! redis_url = "redis://localhost:6379"
//! connection_timeout_ms = 5000
//! db = 0
//! ```

use crate::{CacheError, CacheInterface};
use async_trait::async_trait;
use gasless_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, warn};

const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5000;

/// The connection is created lazily on first use so that it is bound to the
/// runtime that actually serves requests.
pub struct RedisCache {
	client: OnceCell<Arc<ConnectionManager>>,
	redis_url: String,
	timeout_ms: u64,
}

impl RedisCache {
	pub fn new(redis_url: String, timeout_ms: u64) -> Result<Self, CacheError> {
		if redis_url.is_empty() {
			return Err(CacheError::Configuration(
				"Redis URL cannot be empty".to_string(),
			));
		}

		Ok(Self {
			client: OnceCell::new(),
			redis_url,
			timeout_ms,
		})
	}

	async fn connection(&self) -> Result<ConnectionManager, CacheError> {
		let client = self
			.client
			.get_or_try_init(|| initialize_redis_connection(&self.redis_url, self.timeout_ms))
			.await?;
		Ok(client.as_ref().clone())
	}

	fn map_redis_error(&self, error: RedisError, context: &str) -> CacheError {
		warn!(context = %context, error = %error, "redis operation failed");

		match error.kind() {
			redis::ErrorKind::AuthenticationFailed => {
				CacheError::Backend("Redis authentication failed".to_string())
			}
			redis::ErrorKind::IoError => CacheError::Backend(format!(
				"Redis connection error in operation '{}': {}",
				context, error
			)),
			_ => CacheError::Backend(format!("Redis operation '{}' failed: {}", context, error)),
		}
	}
}

impl std::fmt::Debug for RedisCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RedisCache")
			.field("redis_url", &self.redis_url)
			.field("connected", &self.client.initialized())
			.finish()
	}
}

#[async_trait]
impl CacheInterface for RedisCache {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, CacheError> {
		let mut conn = self.connection().await?;
		let value: Option<Vec<u8>> = conn
			.get(key)
			.await
			.map_err(|e| self.map_redis_error(e, "get_bytes"))?;
		value.ok_or_else(|| CacheError::NotFound(key.to_string()))
	}

	async fn get_batch(&self, keys: &[String]) -> Result<Vec<(String, Vec<u8>)>, CacheError> {
		if keys.is_empty() {
			return Ok(Vec::new());
		}

		let mut conn = self.connection().await?;
		let values: Vec<Option<Vec<u8>>> = conn
			.mget(keys)
			.await
			.map_err(|e| self.map_redis_error(e, "get_batch"))?;

		let results: Vec<(String, Vec<u8>)> = keys
			.iter()
			.zip(values)
			.filter_map(|(key, value)| value.map(|data| (key.clone(), data)))
			.collect();

		debug!(
			requested = keys.len(),
			found = results.len(),
			"batch retrieval completed"
		);
		Ok(results)
	}

	async fn exists(&self, key: &str) -> Result<bool, CacheError> {
		let mut conn = self.connection().await?;
		conn.exists(key)
			.await
			.map_err(|e| self.map_redis_error(e, "exists"))
	}

	async fn set_members(&self, set_key: &str) -> Result<Vec<String>, CacheError> {
		let mut conn = self.connection().await?;
		conn.smembers(set_key)
			.await
			.map_err(|e| self.map_redis_error(e, "set_members"))
	}

	async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), CacheError> {
		let mut conn = self.connection().await?;
		let _: () = conn
			.srem(set_key, member)
			.await
			.map_err(|e| self.map_redis_error(e, "set_remove"))?;
		Ok(())
	}

	async fn upsert_tracked(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Duration,
		set_key: &str,
		member: &str,
	) -> Result<(), CacheError> {
		// SET EX rejects zero.
		let ttl_secs = ttl.as_secs().max(1);
		let mut conn = self.connection().await?;
		let _: () = redis::pipe()
			.atomic()
			.set_ex(key, value, ttl_secs)
			.ignore()
			.sadd(set_key, member)
			.ignore()
			.query_async(&mut conn)
			.await
			.map_err(|e| self.map_redis_error(e, "upsert_tracked"))?;

		debug!(key = %key, ttl_secs, "stored tracked record in redis");
		Ok(())
	}

	async fn delete_tracked(
		&self,
		key: &str,
		set_key: &str,
		member: &str,
	) -> Result<(), CacheError> {
		let mut conn = self.connection().await?;
		let _: () = redis::pipe()
			.atomic()
			.del(key)
			.ignore()
			.srem(set_key, member)
			.ignore()
			.query_async(&mut conn)
			.await
			.map_err(|e| self.map_redis_error(e, "delete_tracked"))?;

		debug!(key = %key, "deleted tracked record from redis");
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RedisCacheSchema)
	}
}

pub struct RedisCacheSchema;

impl ConfigSchema for RedisCacheSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("redis_url", FieldType::Url)],
			vec![
				Field::new(
					"connection_timeout_ms",
					FieldType::Integer {
						min: Some(100),
						max: Some(60000),
					},
				),
				Field::new(
					"db",
					FieldType::Integer {
						min: Some(0),
						max: Some(15),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Opens a connection manager, failing if the server does not answer
/// within `timeout_ms`.
pub async fn initialize_redis_connection(
	redis_url: &str,
	timeout_ms: u64,
) -> Result<Arc<ConnectionManager>, CacheError> {
	let redis_client = redis::Client::open(redis_url)
		.map_err(|e| CacheError::Configuration(format!("Failed to create Redis client: {}", e)))?;

	let connection_manager = timeout(
		Duration::from_millis(timeout_ms),
		ConnectionManager::new(redis_client),
	)
	.await
	.map_err(|_| CacheError::Backend(format!("Redis connection timeout after {}ms", timeout_ms)))?
	.map_err(|e| CacheError::Backend(format!("Failed to create connection manager: {}", e)))?;

	debug!(redis_url = %redis_url, "redis connection established");
	Ok(Arc::new(connection_manager))
}

/// Appends `/db` unless the URL already names a database.
fn with_database(redis_url: &str, db: i64) -> String {
	let names_db = redis_url
		.rsplit_once('/')
		.map(|(head, tail)| !head.ends_with('/') && tail.parse::<u8>().is_ok())
		.unwrap_or(false);
	if names_db {
		redis_url.to_string()
	} else {
		format!("{}/{}", redis_url.trim_end_matches('/'), db)
	}
}

/// Factory function to create a Redis cache backend from configuration.
///
/// The connection itself is established on first use.
pub fn create_cache(config: &toml::Value) -> Result<Box<dyn CacheInterface>, CacheError> {
	RedisCacheSchema
		.validate(config)
		.map_err(|e| CacheError::Configuration(format!("Invalid configuration: {}", e)))?;

	let redis_url = config
		.get("redis_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| CacheError::Configuration("redis_url is required".to_string()))?;

	let timeout_ms = config
		.get("connection_timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_CONNECTION_TIMEOUT_MS);

	let db = config.get("db").and_then(|v| v.as_integer()).unwrap_or(0);

	Ok(Box::new(RedisCache::new(
		with_database(redis_url, db),
		timeout_ms,
	)?))
}
