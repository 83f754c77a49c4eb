//! The message published to the deposit topic.

use crate::intent::{DepositIntent, PermitScheme, PermitTypedData};
use crate::witness::Witness;
use alloy::primitives::{Address, Bytes, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `swapTx.data` as it travels through the queue; the permit moves up to
/// `swapTx.typedData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedTxData {
	#[serde(rename = "type")]
	pub scheme: PermitScheme,
	pub deposit_id: String,
	pub witness: Witness,
	pub domain_separator: B256,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub integrator_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSwapTx {
	pub ecosystem: String,
	pub chain_id: u64,
	pub to: Address,
	pub typed_data: PermitTypedData,
	pub data: QueuedTxData,
}

/// Immutable queue envelope for an accepted intent. Identified downstream
/// by the broker's message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
	pub swap_tx: QueuedSwapTx,
	pub signature: Bytes,
	pub submitted_at: DateTime<Utc>,
	pub request_id: String,
}

impl QueuedMessage {
	pub fn from_intent(intent: DepositIntent, request_id: String, submitted_at: DateTime<Utc>) -> Self {
		let DepositIntent { swap_tx, signature } = intent;
		let data = swap_tx.data;
		Self {
			swap_tx: QueuedSwapTx {
				ecosystem: swap_tx.ecosystem,
				chain_id: swap_tx.chain_id,
				to: swap_tx.to,
				typed_data: data.permit,
				data: QueuedTxData {
					scheme: data.scheme,
					deposit_id: data.deposit_id,
					witness: data.witness,
					domain_separator: data.domain_separator,
					integrator_id: data.integrator_id,
				},
			},
			signature,
			submitted_at,
			request_id,
		}
	}

	pub fn deposit_id(&self) -> &str {
		&self.swap_tx.data.deposit_id
	}

	pub fn origin_chain_id(&self) -> u64 {
		self.swap_tx.chain_id
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::intent::tests::intent_json;
	use chrono::TimeZone;

	#[test]
	fn test_from_intent_moves_permit_to_typed_data() {
		let intent: DepositIntent = serde_json::from_value(intent_json()).unwrap();
		let permit = intent.permit().clone();
		let submitted_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

		let queued = QueuedMessage::from_intent(intent, "req-1".to_string(), submitted_at);
		assert_eq!(queued.swap_tx.typed_data, permit);
		assert_eq!(queued.deposit_id(), "42");
		assert_eq!(queued.origin_chain_id(), 10);

		let value = serde_json::to_value(&queued).unwrap();
		assert_eq!(value["swapTx"]["data"]["type"], "erc3009");
		assert_eq!(value["swapTx"]["data"]["witness"]["type"], "BridgeWitness");
		assert!(value["swapTx"]["data"].get("permit").is_none());
		assert_eq!(value["requestId"], "req-1");
		assert_eq!(value["submittedAt"], "2024-01-01T00:00:00Z");
	}
}
