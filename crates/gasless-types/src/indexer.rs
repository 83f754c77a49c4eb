//! Deposit lifecycle status reported by the indexer.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Any status the indexer reports is terminal from the relay's point of
/// view: once the indexer knows about a deposit, the pending entry goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DepositStatus {
	Pending,
	Filled,
	Expired,
	Failed,
	Unknown(String),
}

impl DepositStatus {
	pub fn as_str(&self) -> &str {
		match self {
			DepositStatus::Pending => "pending",
			DepositStatus::Filled => "filled",
			DepositStatus::Expired => "expired",
			DepositStatus::Failed => "failed",
			DepositStatus::Unknown(other) => other,
		}
	}
}

impl From<String> for DepositStatus {
	fn from(value: String) -> Self {
		match value.to_ascii_lowercase().as_str() {
			"pending" => DepositStatus::Pending,
			"filled" => DepositStatus::Filled,
			"expired" => DepositStatus::Expired,
			"failed" => DepositStatus::Failed,
			_ => DepositStatus::Unknown(value),
		}
	}
}

impl From<DepositStatus> for String {
	fn from(status: DepositStatus) -> Self {
		status.as_str().to_string()
	}
}

impl Display for DepositStatus {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
