//! Across indexer API client.
//!
//! ```toml
//! [indexer.implementations.across]
//! base_url = "https://indexer.api.across.to"
//! timeout_ms = 10000
//! ```

use crate::{IndexerError, IndexerInterface};
use async_trait::async_trait;
use gasless_types::{ConfigSchema, DepositStatus, Field, FieldType, Schema, ValidationError};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Deserialize)]
struct DepositStatusResponse {
	status: DepositStatus,
}

pub struct AcrossIndexer {
	client: Client,
	base_url: String,
}

impl AcrossIndexer {
	pub fn new(base_url: String, timeout: Duration) -> Result<Self, IndexerError> {
		let client = Client::builder().timeout(timeout).build().map_err(|e| {
			IndexerError::Configuration(format!("Failed to build HTTP client: {}", e))
		})?;

		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}
}

#[async_trait]
impl IndexerInterface for AcrossIndexer {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AcrossIndexerSchema)
	}

	async fn deposit_status(
		&self,
		origin_chain_id: u64,
		deposit_id: &str,
	) -> Result<Option<DepositStatus>, IndexerError> {
		let url = format!("{}/deposit/status", self.base_url);
		let response = self
			.client
			.get(&url)
			.query(&[
				("originChainId", origin_chain_id.to_string()),
				("depositId", deposit_id.to_string()),
			])
			.send()
			.await
			.map_err(|e| IndexerError::Network(e.to_string()))?;

		let status = response.status();
		if status == StatusCode::NOT_FOUND {
			debug!(origin_chain_id, deposit_id = %deposit_id, "indexer has no record of deposit");
			return Ok(None);
		}
		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			warn!(origin_chain_id, deposit_id = %deposit_id, status = %status, "indexer lookup failed");
			return Err(IndexerError::Status {
				status: status.as_u16(),
				message,
			});
		}

		let body: DepositStatusResponse = response
			.json()
			.await
			.map_err(|e| IndexerError::InvalidResponse(e.to_string()))?;

		debug!(origin_chain_id, deposit_id = %deposit_id, status = %body.status, "indexer reported deposit");
		Ok(Some(body.status))
	}
}

pub struct AcrossIndexerSchema;

impl ConfigSchema for AcrossIndexerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("base_url", FieldType::Url)],
			vec![Field::new(
				"timeout_ms",
				FieldType::Integer {
					min: Some(100),
					max: Some(120_000),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create an Across indexer client from configuration.
pub fn create_indexer(config: &toml::Value) -> Result<Box<dyn IndexerInterface>, IndexerError> {
	AcrossIndexerSchema
		.validate(config)
		.map_err(|e| IndexerError::Configuration(format!("Invalid configuration: {}", e)))?;

	let base_url = config
		.get("base_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| IndexerError::Configuration("base_url is required".to_string()))?
		.to_string();

	let timeout_ms = config
		.get("timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_MS);

	Ok(Box::new(AcrossIndexer::new(
		base_url,
		Duration::from_millis(timeout_ms),
	)?))
}
