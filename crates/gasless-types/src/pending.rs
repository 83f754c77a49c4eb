//! Cache-resident projection of a deposit that is still waiting on-chain.

use crate::queued::QueuedMessage;
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What clients see when polling for outstanding gasless deposits.
///
/// Amounts are decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingGaslessDeposit {
	pub deposit_id: String,
	pub origin_chain_id: u64,
	pub destination_chain_id: u64,
	pub witness_type: String,
	pub depositor: Address,
	pub recipient: String,
	pub input_token: Address,
	pub output_token: String,
	pub input_amount: String,
	pub output_amount: String,
	pub fill_deadline: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub integrator_id: Option<String>,
	pub submitted_at: DateTime<Utc>,
	pub request_id: String,
	pub message_id: String,
}

impl PendingGaslessDeposit {
	pub fn from_queued(message: &QueuedMessage, message_id: impl Into<String>) -> Self {
		let data = &message.swap_tx.data;
		let base = data.witness.base();
		Self {
			deposit_id: data.deposit_id.clone(),
			origin_chain_id: message.swap_tx.chain_id,
			destination_chain_id: base.destination_chain_id,
			witness_type: data.witness.kind().to_string(),
			depositor: base.depositor,
			recipient: base.recipient.clone(),
			input_token: base.input_token,
			output_token: base.output_token.clone(),
			input_amount: data.witness.input_amount().to_string(),
			output_amount: base.output_amount.to_string(),
			fill_deadline: base.fill_deadline,
			integrator_id: data.integrator_id.clone(),
			submitted_at: message.submitted_at,
			request_id: message.request_id.clone(),
			message_id: message_id.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::intent::{tests::intent_json, DepositIntent};

	#[test]
	fn test_projection_from_queued_message() {
		let intent: DepositIntent = serde_json::from_value(intent_json()).unwrap();
		let queued = QueuedMessage::from_intent(intent, "req-7".to_string(), Utc::now());

		let pending = PendingGaslessDeposit::from_queued(&queued, "msg-1");
		assert_eq!(pending.deposit_id, "42");
		assert_eq!(pending.origin_chain_id, 10);
		assert_eq!(pending.destination_chain_id, 42161);
		assert_eq!(pending.witness_type, "BridgeWitness");
		assert_eq!(pending.input_amount, "1000000");
		assert_eq!(pending.output_amount, "990000");
		assert_eq!(pending.fill_deadline, 1700003600);
		assert_eq!(pending.request_id, "req-7");
		assert_eq!(pending.message_id, "msg-1");

		let value = serde_json::to_value(&pending).unwrap();
		assert_eq!(value["witnessType"], "BridgeWitness");
		assert!(value.get("integratorId").is_none());
	}
}
