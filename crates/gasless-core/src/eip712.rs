//! EIP-712 signer recovery for ERC-3009 permits.

use alloy::dyn_abi::TypedData;
use alloy::primitives::{Address, Signature};
use gasless_types::{PermitTypedData, B256, SIGNATURE_LENGTH};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoveryError {
	#[error("Invalid typed data: {0}")]
	TypedData(String),
	#[error("Invalid signature: {0}")]
	Signature(String),
	#[error("Recovery failed: {0}")]
	Recovery(String),
}

/// Computes the EIP-712 digest `keccak256(0x1901 || domainSeparator || hashStruct(message))`.
///
/// The `EIP712Domain` type is derived from the populated domain fields when
/// the permit does not declare it.
pub fn permit_signing_hash(permit: &PermitTypedData) -> Result<B256, RecoveryError> {
	let value =
		serde_json::to_value(permit).map_err(|e| RecoveryError::TypedData(e.to_string()))?;
	let typed: TypedData =
		serde_json::from_value(value).map_err(|e| RecoveryError::TypedData(e.to_string()))?;
	typed
		.eip712_signing_hash()
		.map_err(|e| RecoveryError::TypedData(e.to_string()))
}

/// Recovers the address that signed `permit`.
pub fn recover_signer(permit: &PermitTypedData, signature: &[u8]) -> Result<Address, RecoveryError> {
	if signature.len() != SIGNATURE_LENGTH {
		return Err(RecoveryError::Signature(format!(
			"Signature must be {} bytes, got {}",
			SIGNATURE_LENGTH,
			signature.len()
		)));
	}

	let hash = permit_signing_hash(permit)?;
	let sig = Signature::try_from(signature).map_err(|e| RecoveryError::Signature(e.to_string()))?;

	sig.recover_address_from_prehash(&hash)
		.map_err(|e| RecoveryError::Recovery(e.to_string()))
}
