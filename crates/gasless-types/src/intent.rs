//! Signed gasless deposit intents as accepted by the submission endpoint.

use crate::witness::Witness;
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Ecosystem tag carried by every gasless transaction.
pub const GASLESS_ECOSYSTEM: &str = "evm-gasless";

/// Length of an ECDSA signature in bytes (r || s || v).
pub const SIGNATURE_LENGTH: usize = 65;

/// Structural validation failure for a deposit intent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntentError {
	#[error("Invalid field '{field}': {message}")]
	InvalidField { field: String, message: String },
}

impl IntentError {
	pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
		IntentError::InvalidField {
			field: field.into(),
			message: message.into(),
		}
	}
}

/// Permit scheme authorizing the token pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermitScheme {
	/// ERC-3009 `receiveWithAuthorization`.
	#[serde(rename = "erc3009")]
	Erc3009,
}

/// A single member of an EIP-712 struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
	pub name: String,
	#[serde(rename = "type")]
	pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitDomain {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: Address,
}

/// The authorization the user signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitMessage {
	pub from: Address,
	pub to: Address,
	pub value: U256,
	pub valid_after: U256,
	pub valid_before: U256,
	pub nonce: B256,
}

/// EIP-712 typed data for the permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitTypedData {
	pub domain: PermitDomain,
	pub types: BTreeMap<String, Vec<TypedField>>,
	pub primary_type: String,
	pub message: PermitMessage,
}

impl PermitTypedData {
	fn validate(&self) -> Result<(), IntentError> {
		let primary = self.types.get(&self.primary_type).ok_or_else(|| {
			IntentError::invalid(
				"permit.primaryType",
				format!("type '{}' is not declared in permit.types", self.primary_type),
			)
		})?;

		for required in ["from", "to", "value", "validAfter", "validBefore", "nonce"] {
			if !primary.iter().any(|field| field.name == required) {
				return Err(IntentError::invalid(
					format!("permit.types.{}", self.primary_type),
					format!("missing member '{}'", required),
				));
			}
		}

		if self.message.valid_before <= self.message.valid_after {
			return Err(IntentError::invalid(
				"permit.message.validBefore",
				"must be after validAfter",
			));
		}
		Ok(())
	}
}

/// The `data` object of a gasless transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaslessTxData {
	#[serde(rename = "type")]
	pub scheme: PermitScheme,
	pub deposit_id: String,
	pub witness: Witness,
	pub permit: PermitTypedData,
	pub domain_separator: B256,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub integrator_id: Option<String>,
}

/// The gasless transaction a relayer will submit on the user's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapTx {
	pub ecosystem: String,
	pub chain_id: u64,
	pub to: Address,
	pub data: GaslessTxData,
}

/// Body of a submission request: the transaction plus the user's signature
/// over `swapTx.data.permit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositIntent {
	pub swap_tx: SwapTx,
	pub signature: Bytes,
}

impl DepositIntent {
	pub fn deposit_id(&self) -> &str {
		&self.swap_tx.data.deposit_id
	}

	pub fn permit(&self) -> &PermitTypedData {
		&self.swap_tx.data.permit
	}

	pub fn witness(&self) -> &Witness {
		&self.swap_tx.data.witness
	}

	/// Shape checks beyond what typed deserialization already enforces.
	pub fn validate(&self) -> Result<(), IntentError> {
		if self.swap_tx.ecosystem != GASLESS_ECOSYSTEM {
			return Err(IntentError::invalid(
				"swapTx.ecosystem",
				format!("expected '{}'", GASLESS_ECOSYSTEM),
			));
		}
		if self.swap_tx.chain_id == 0 {
			return Err(IntentError::invalid("swapTx.chainId", "must be non-zero"));
		}

		let data = &self.swap_tx.data;
		if data.deposit_id.trim().is_empty() {
			return Err(IntentError::invalid("swapTx.data.depositId", "must not be empty"));
		}
		if let Some(integrator_id) = &data.integrator_id {
			if integrator_id.trim().is_empty() {
				return Err(IntentError::invalid(
					"swapTx.data.integratorId",
					"must not be empty when present",
				));
			}
		}

		data.permit.validate()?;
		data.witness.validate()?;

		if self.signature.len() != SIGNATURE_LENGTH {
			return Err(IntentError::invalid(
				"signature",
				format!(
					"expected {} bytes, got {}",
					SIGNATURE_LENGTH,
					self.signature.len()
				),
			));
		}
		Ok(())
	}
}
