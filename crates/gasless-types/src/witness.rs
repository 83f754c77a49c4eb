//! Witness payloads embedded in a gasless deposit.
//!
//! The witness is the signed description of the deposit the periphery
//! contract will perform once the permit is redeemed. It comes in two
//! flavours: a plain bridge deposit and a swap-then-bridge deposit. Both
//! carry the same base deposit parameters; the swap flavour adds the
//! execution parameters for the origin-chain swap.

use crate::intent::IntentError;
use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Fee paid to the submitter of the gasless transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fees {
	pub amount: U256,
	pub recipient: Address,
}

/// Deposit parameters shared by both witness flavours.
///
/// `outputToken`, `recipient` and `exclusiveRelayer` are bytes32 on the
/// contract side so that non-EVM destinations can be addressed; they are
/// accepted as either 20-byte or 32-byte hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseDepositData {
	pub input_token: Address,
	pub output_token: String,
	pub output_amount: U256,
	pub depositor: Address,
	pub recipient: String,
	pub destination_chain_id: u64,
	pub exclusive_relayer: String,
	pub quote_timestamp: u32,
	pub fill_deadline: u32,
	pub exclusivity_parameter: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exclusivity_deadline: Option<u32>,
	pub message: Bytes,
}

impl BaseDepositData {
	fn validate(&self, prefix: &str) -> Result<(), IntentError> {
		check_hex_word(&format!("{prefix}.outputToken"), &self.output_token)?;
		check_hex_word(&format!("{prefix}.recipient"), &self.recipient)?;
		check_hex_word(&format!("{prefix}.exclusiveRelayer"), &self.exclusive_relayer)?;

		if self.destination_chain_id == 0 {
			return Err(IntentError::invalid(
				format!("{prefix}.destinationChainId"),
				"must be non-zero",
			));
		}
		if self.fill_deadline <= self.quote_timestamp {
			return Err(IntentError::invalid(
				format!("{prefix}.fillDeadline"),
				"must be after quoteTimestamp",
			));
		}
		Ok(())
	}
}

/// Witness data for a plain bridge deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositData {
	pub submission_fees: Fees,
	pub base_deposit_data: BaseDepositData,
	pub input_amount: U256,
	pub spoke_pool: Address,
	pub nonce: U256,
}

/// Witness data for a swap on the origin chain followed by a bridge deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapAndDepositData {
	pub submission_fees: Fees,
	pub deposit_data: BaseDepositData,
	pub swap_token: Address,
	pub exchange: Address,
	/// 0 = approval, 1 = transfer, 2 = permit2 approval.
	pub transfer_type: u8,
	pub swap_token_amount: U256,
	pub min_expected_input_token_amount: U256,
	pub router_calldata: Bytes,
	pub enable_proportional_adjustment: bool,
	pub spoke_pool: Address,
	pub nonce: U256,
}

/// Tagged union of the supported witness flavours.
///
/// Serialized as `{"type": "<variant>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Witness {
	BridgeWitness(DepositData),
	BridgeAndSwapWitness(SwapAndDepositData),
}

impl Witness {
	/// Name of the variant as it appears on the wire.
	pub fn kind(&self) -> &'static str {
		match self {
			Witness::BridgeWitness(_) => "BridgeWitness",
			Witness::BridgeAndSwapWitness(_) => "BridgeAndSwapWitness",
		}
	}

	/// The base deposit parameters, whichever flavour carries them.
	pub fn base(&self) -> &BaseDepositData {
		match self {
			Witness::BridgeWitness(data) => &data.base_deposit_data,
			Witness::BridgeAndSwapWitness(data) => &data.deposit_data,
		}
	}

	pub fn depositor(&self) -> Address {
		self.base().depositor
	}

	/// Amount entering the bridge deposit. For swaps this is the minimum
	/// amount the swap is expected to produce.
	pub fn input_amount(&self) -> U256 {
		match self {
			Witness::BridgeWitness(data) => data.input_amount,
			Witness::BridgeAndSwapWitness(data) => data.min_expected_input_token_amount,
		}
	}

	pub fn validate(&self) -> Result<(), IntentError> {
		match self {
			Witness::BridgeWitness(data) => data.base_deposit_data.validate("witness.data.baseDepositData"),
			Witness::BridgeAndSwapWitness(data) => {
				if data.transfer_type > 2 {
					return Err(IntentError::invalid(
						"witness.data.transferType",
						format!("unknown transfer type {}", data.transfer_type),
					));
				}
				if data.swap_token_amount.is_zero() {
					return Err(IntentError::invalid(
						"witness.data.swapTokenAmount",
						"must be non-zero",
					));
				}
				data.deposit_data.validate("witness.data.depositData")
			}
		}
	}
}

/// Checks that a value is 0x-prefixed hex of 20 or 32 bytes.
pub(crate) fn check_hex_word(field: &str, value: &str) -> Result<(), IntentError> {
	let digits = value
		.strip_prefix("0x")
		.ok_or_else(|| IntentError::invalid(field, "must be 0x-prefixed hex"))?;

	if digits.len() != 40 && digits.len() != 64 {
		return Err(IntentError::invalid(field, "must be 20 or 32 bytes"));
	}
	if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
		return Err(IntentError::invalid(field, "must be hexadecimal"));
	}
	Ok(())
}
