//! Configuration types for the relay.

use crate::serde_helpers::{deserialize_chain_address_map, serialize_chain_address_map};
use gasless_types::{Address, DropReason};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete relay configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	#[serde(default)]
	pub relay: RelayConfig,
	pub api: ApiConfig,
	pub queue: QueueConfig,
	pub cache: BackendConfig,
	pub indexer: BackendConfig,
	/// Canonical periphery contract per origin chain.
	#[serde(
		default,
		deserialize_with = "deserialize_chain_address_map",
		serialize_with = "serialize_chain_address_map"
	)]
	pub periphery: HashMap<u64, Address>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
	#[serde(default = "default_name")]
	pub name: String,
	/// Maximum age of a queued message before it is dead-lettered.
	#[serde(default = "default_ttl_seconds")]
	pub ttl_seconds: u64,
	/// Drop reasons that also publish the raw payload to the dead-letter topic.
	#[serde(default = "default_dead_letter_reasons")]
	pub dead_letter_reasons: Vec<DropReason>,
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			name: default_name(),
			ttl_seconds: default_ttl_seconds(),
			dead_letter_reasons: default_dead_letter_reasons(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default = "default_host")]
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
	/// Token the broker must present on push deliveries.
	pub push_secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
	pub primary: String,
	pub topic: String,
	pub dead_letter_topic: String,
	pub subscription: String,
	#[serde(default = "default_max_messages_per_pull")]
	pub max_messages_per_pull: u32,
	pub implementations: HashMap<String, toml::Value>,
}

/// Selects one of several configured implementations of a backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

impl BackendConfig {
	pub fn primary_config(&self) -> Option<&toml::Value> {
		self.implementations.get(&self.primary)
	}
}

impl QueueConfig {
	pub fn primary_config(&self) -> Option<&toml::Value> {
		self.implementations.get(&self.primary)
	}
}

fn default_name() -> String {
	"gasless-relay".to_string()
}

fn default_ttl_seconds() -> u64 {
	300
}

fn default_dead_letter_reasons() -> Vec<DropReason> {
	vec![DropReason::Expired]
}

fn default_host() -> String {
	"0.0.0.0".to_string()
}

fn default_port() -> u16 {
	3000
}

fn default_max_messages_per_pull() -> u32 {
	10
}
