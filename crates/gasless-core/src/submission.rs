//! Validation and enqueueing of signed deposit intents.
//!
//! Checks run in a fixed order and the first failure is final. Nothing is
//! published unless every check passes.

use crate::eip712::recover_signer;
use crate::periphery::PeripheryRegistry;
use chrono::Utc;
use gasless_queue::QueueService;
use gasless_types::{Address, DepositIntent, QueuedMessage, SubmitResponse};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum SubmissionError {
	#[error("Invalid request: {0}")]
	InvalidRequest(String),
	#[error("Target address {to} is not the periphery contract for chain {chain_id}")]
	TargetAddressInvalid { chain_id: u64, to: Address },
	#[error("Signature invalid: {0}")]
	SignatureInvalid(String),
	#[error("Permit signer {signer} does not match witness depositor {depositor}")]
	DepositorMismatch { signer: Address, depositor: Address },
	#[error("Failed to publish deposit: {0}")]
	Publish(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
}

impl SubmissionError {
	/// Stable machine-readable error kind.
	pub fn kind(&self) -> &'static str {
		match self {
			SubmissionError::InvalidRequest(_) => "invalid-request",
			SubmissionError::TargetAddressInvalid { .. } => "target-address-invalid",
			SubmissionError::SignatureInvalid(_) => "signature-invalid",
			SubmissionError::DepositorMismatch { .. } => "depositor-mismatch",
			SubmissionError::Publish(_) => "publish-failed",
			SubmissionError::Serialization(_) => "internal-error",
		}
	}

	/// Whether the failure lies with the caller rather than the relay.
	pub fn is_client_error(&self) -> bool {
		!matches!(
			self,
			SubmissionError::Publish(_) | SubmissionError::Serialization(_)
		)
	}
}

pub struct SubmissionService {
	queue: Arc<QueueService>,
	periphery: PeripheryRegistry,
}

impl SubmissionService {
	pub fn new(queue: Arc<QueueService>, periphery: PeripheryRegistry) -> Self {
		Self { queue, periphery }
	}

	/// Parses a raw request body. Shape errors from typed deserialization,
	/// including unknown witness or permit variants, are reported as
	/// invalid requests.
	pub fn parse_intent(body: &[u8]) -> Result<DepositIntent, SubmissionError> {
		serde_json::from_slice(body).map_err(|e| SubmissionError::InvalidRequest(e.to_string()))
	}

	#[instrument(skip(self, intent), fields(deposit_id = %intent.deposit_id(), chain_id = intent.swap_tx.chain_id))]
	pub async fn submit(
		&self,
		intent: DepositIntent,
		request_id: String,
	) -> Result<SubmitResponse, SubmissionError> {
		intent
			.validate()
			.map_err(|e| SubmissionError::InvalidRequest(e.to_string()))?;

		let chain_id = intent.swap_tx.chain_id;
		if !self.periphery.is_canonical(chain_id, intent.swap_tx.to) {
			warn!(to = %intent.swap_tx.to, "rejected intent targeting unknown contract");
			return Err(SubmissionError::TargetAddressInvalid {
				chain_id,
				to: intent.swap_tx.to,
			});
		}

		let permit = intent.permit();
		let signer = recover_signer(permit, &intent.signature)
			.map_err(|e| SubmissionError::SignatureInvalid(e.to_string()))?;
		if signer != permit.message.from {
			warn!(signer = %signer, from = %permit.message.from, "permit signature does not match sender");
			return Err(SubmissionError::SignatureInvalid(format!(
				"recovered {} but permit is from {}",
				signer, permit.message.from
			)));
		}

		let depositor = intent.witness().depositor();
		if permit.message.from != depositor {
			return Err(SubmissionError::DepositorMismatch {
				signer: permit.message.from,
				depositor,
			});
		}

		let deposit_id = intent.deposit_id().to_string();
		let message = QueuedMessage::from_intent(intent, request_id, Utc::now());
		let payload =
			serde_json::to_vec(&message).map_err(|e| SubmissionError::Serialization(e.to_string()))?;

		let message_id = self
			.queue
			.publish_deposit(payload)
			.await
			.map_err(|e| SubmissionError::Publish(e.to_string()))?;

		info!(message_id = %message_id, request_id = %message.request_id, "queued gasless deposit");
		Ok(SubmitResponse {
			deposit_id,
			message_id,
		})
	}
}
