//! HTTP response bodies.

use crate::pending::PendingGaslessDeposit;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
	pub deposit_id: String,
	pub message_id: String,
}

/// Result of handling one push delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
	/// `acked`, `retry` or `rejected`.
	pub status: String,
	pub reason: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub deposit_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDepositsResponse {
	pub deposits: Vec<PendingGaslessDeposit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: String,
}
