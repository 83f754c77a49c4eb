//! Reasons a queued message is dropped without reaching the cache.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
	/// The push envelope itself was unusable.
	Malformed,
	/// Older than the ingestion TTL.
	Expired,
	/// The payload was not a deposit record.
	DecodeError,
	/// Already seen by the duplicate detector.
	Duplicate,
}

impl DropReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			DropReason::Malformed => "malformed",
			DropReason::Expired => "expired",
			DropReason::DecodeError => "decode_error",
			DropReason::Duplicate => "duplicate",
		}
	}
}

impl Display for DropReason {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
