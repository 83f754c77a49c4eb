//! Configuration loading for the gasless relay.
//!
//! Configuration is read from a TOML file, `${VAR}` references are replaced
//! with environment values, a handful of settings can be overridden through
//! `GASLESS_*` variables, and the result is validated before any backend is
//! built.

pub mod serde_helpers;
pub mod types;

pub use types::*;

use regex::Regex;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "GASLESS_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;

		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}
		let content = tokio::fs::read_to_string(file_path).await?;

		let mut config = self.parse(&content)?;
		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		Ok(config)
	}

	/// Substitutes environment references and parses TOML content, without
	/// overrides or validation.
	pub fn parse(&self, content: &str) -> Result<Config, ConfigError> {
		let substituted = substitute_env_vars(content)?;
		toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Ok(http_port) = env::var(format!("{}HTTP_PORT", self.env_prefix)) {
			debug!("Overriding HTTP port from environment");
			config.api.port = http_port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		if let Ok(secret) = env::var(format!("{}PUSH_SECRET", self.env_prefix)) {
			debug!("Overriding push secret from environment");
			config.api.push_secret = secret;
		}

		Ok(())
	}
}

fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;
	let mut result = content.to_string();

	for cap in re.captures_iter(content) {
		let full_match = &cap[0];
		let var_name = &cap[1];

		let env_value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

		result = result.replace(full_match, &env_value);
	}

	Ok(result)
}

/// Checks cross-field constraints that serde cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
	let required = [
		("queue.subscription", &config.queue.subscription),
		("queue.topic", &config.queue.topic),
		("queue.dead_letter_topic", &config.queue.dead_letter_topic),
		("api.push_secret", &config.api.push_secret),
	];
	for (name, value) in required {
		if value.trim().is_empty() {
			return Err(ConfigError::ValidationError(format!("{} must not be empty", name)));
		}
	}

	if config.queue.dead_letter_topic == config.queue.topic {
		return Err(ConfigError::ValidationError(format!(
			"queue.dead_letter_topic must differ from queue.topic '{}'",
			config.queue.topic
		)));
	}

	if config.relay.ttl_seconds == 0 {
		return Err(ConfigError::ValidationError(
			"relay.ttl_seconds must be greater than zero".to_string(),
		));
	}

	if !(1..=1000).contains(&config.queue.max_messages_per_pull) {
		return Err(ConfigError::ValidationError(format!(
			"queue.max_messages_per_pull must be between 1 and 1000, got {}",
			config.queue.max_messages_per_pull
		)));
	}

	let backends = [
		("queue", &config.queue.primary, config.queue.primary_config()),
		("cache", &config.cache.primary, config.cache.primary_config()),
		("indexer", &config.indexer.primary, config.indexer.primary_config()),
	];
	for (section, primary, selected) in backends {
		if selected.is_none() {
			return Err(ConfigError::ValidationError(format!(
				"{}.primary '{}' has no entry in {}.implementations",
				section, primary, section
			)));
		}
	}

	Ok(())
}
