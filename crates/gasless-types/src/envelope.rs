//! Push delivery envelope as posted by the broker to the ingest webhook.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
	/// Base64 payload.
	pub data: String,
	pub publish_time: DateTime<Utc>,
	pub message_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub attributes: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEnvelope {
	pub message: PushMessage,
	pub subscription: String,
}

impl PushEnvelope {
	/// Parses an envelope from a raw request body. Any shape violation,
	/// including a payload that is not valid base64, yields `None`.
	pub fn parse(body: &[u8]) -> Option<(Self, Vec<u8>)> {
		let envelope: PushEnvelope = serde_json::from_slice(body).ok()?;
		if envelope.message.message_id.is_empty() || envelope.subscription.is_empty() {
			return None;
		}
		let payload = envelope.message.decode_data().ok()?;
		Some((envelope, payload))
	}
}

impl PushMessage {
	pub fn decode_data(&self) -> Result<Vec<u8>, base64::DecodeError> {
		general_purpose::STANDARD.decode(&self.data)
	}
}
