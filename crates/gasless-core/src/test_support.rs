//! Fixtures shared by the unit tests of this crate.

use crate::eip712::permit_signing_hash;
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use gasless_types::{Address, DepositIntent, PermitTypedData, QueuedMessage};
use serde_json::json;

/// Canonical periphery on chain 10 in these fixtures.
pub const PERIPHERY: &str = "0x89415a82d909a7238d69094c3dd1dcc1acbda85c";

pub fn periphery() -> Address {
	PERIPHERY.parse().unwrap()
}

fn permit_json(from: Address) -> serde_json::Value {
	json!({
		"domain": {
			"name": "USD Coin",
			"version": "2",
			"chainId": 10,
			"verifyingContract": "0x0b2c639c533813f4aa9d7837caf62653d097ff85"
		},
		"types": {
			"ReceiveWithAuthorization": [
				{ "name": "from", "type": "address" },
				{ "name": "to", "type": "address" },
				{ "name": "value", "type": "uint256" },
				{ "name": "validAfter", "type": "uint256" },
				{ "name": "validBefore", "type": "uint256" },
				{ "name": "nonce", "type": "bytes32" }
			]
		},
		"primaryType": "ReceiveWithAuthorization",
		"message": {
			"from": from.to_string(),
			"to": PERIPHERY,
			"value": "1000000",
			"validAfter": "0",
			"validBefore": "1700003600",
			"nonce": "0x0000000000000000000000000000000000000000000000000000000000000001"
		}
	})
}

fn base_deposit_json(depositor: Address) -> serde_json::Value {
	json!({
		"inputToken": "0x0b2c639c533813f4aa9d7837caf62653d097ff85",
		"outputToken": "0xaf88d065e77c8cc2239327c5edb3a432268e5831",
		"outputAmount": "990000",
		"depositor": depositor.to_string(),
		"recipient": depositor.to_string(),
		"destinationChainId": 42161,
		"exclusiveRelayer": "0x0000000000000000000000000000000000000000",
		"quoteTimestamp": 1700000000u32,
		"fillDeadline": 1700003600u32,
		"exclusivityParameter": 0,
		"message": "0x"
	})
}

pub fn bridge_witness_json(depositor: Address) -> serde_json::Value {
	json!({
		"type": "BridgeWitness",
		"data": {
			"submissionFees": { "amount": "0", "recipient": "0x2222222222222222222222222222222222222222" },
			"baseDepositData": base_deposit_json(depositor),
			"inputAmount": "1000000",
			"spokePool": "0x6f26bf09b1c792e3228e5467807a900a503c0281",
			"nonce": "0"
		}
	})
}

pub fn swap_witness_json(depositor: Address) -> serde_json::Value {
	json!({
		"type": "BridgeAndSwapWitness",
		"data": {
			"submissionFees": { "amount": "0", "recipient": "0x2222222222222222222222222222222222222222" },
			"depositData": base_deposit_json(depositor),
			"swapToken": "0x4200000000000000000000000000000000000006",
			"exchange": "0x3333333333333333333333333333333333333333",
			"transferType": 1,
			"swapTokenAmount": "500000000000000",
			"minExpectedInputTokenAmount": "1000000",
			"routerCalldata": "0xdeadbeef",
			"enableProportionalAdjustment": false,
			"spokePool": "0x6f26bf09b1c792e3228e5467807a900a503c0281",
			"nonce": "0"
		}
	})
}

pub fn permit_for(from: Address) -> PermitTypedData {
	serde_json::from_value(permit_json(from)).unwrap()
}

pub fn sign_permit(signer: &PrivateKeySigner, permit: &PermitTypedData) -> Vec<u8> {
	let hash = permit_signing_hash(permit).unwrap();
	signer.sign_hash_sync(&hash).unwrap().as_bytes().to_vec()
}

/// Unsigned intent JSON for `deposit_id` with the given permit signer and
/// witness. The signature field is a placeholder of the right length.
pub fn intent_json(deposit_id: &str, from: Address, witness: serde_json::Value) -> serde_json::Value {
	json!({
		"swapTx": {
			"ecosystem": "evm-gasless",
			"chainId": 10,
			"to": PERIPHERY,
			"data": {
				"type": "erc3009",
				"depositId": deposit_id,
				"witness": witness,
				"permit": permit_json(from),
				"domainSeparator": "0x0000000000000000000000000000000000000000000000000000000000000002"
			}
		},
		"signature": format!("0x{}", "11".repeat(65))
	})
}

/// Parses `value` and replaces its signature with one by `signer`.
pub fn sign_intent(signer: &PrivateKeySigner, value: serde_json::Value) -> DepositIntent {
	let mut intent: DepositIntent = serde_json::from_value(value).unwrap();
	intent.signature = sign_permit(signer, intent.permit()).into();
	intent
}

/// A bridge intent signed by the depositor it names.
pub fn signed_intent(signer: &PrivateKeySigner, deposit_id: &str) -> DepositIntent {
	sign_intent(
		signer,
		intent_json(
			deposit_id,
			signer.address(),
			bridge_witness_json(signer.address()),
		),
	)
}

pub fn queued_message(deposit_id: &str) -> QueuedMessage {
	let signer = PrivateKeySigner::random();
	QueuedMessage::from_intent(
		signed_intent(&signer, deposit_id),
		format!("req-{}", deposit_id),
		Utc::now(),
	)
}

pub fn queued_payload(deposit_id: &str) -> Vec<u8> {
	serde_json::to_vec(&queued_message(deposit_id)).unwrap()
}

/// Push envelope body as the broker would post it.
pub fn push_body(payload: &[u8], publish_time: DateTime<Utc>, message_id: &str) -> Vec<u8> {
	serde_json::to_vec(&json!({
		"message": {
			"data": general_purpose::STANDARD.encode(payload),
			"publishTime": publish_time.to_rfc3339(),
			"messageId": message_id
		},
		"subscription": "projects/test/subscriptions/gasless-deposits-push"
	}))
	.unwrap()
}
