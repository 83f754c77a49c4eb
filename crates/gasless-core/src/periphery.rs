//! Canonical periphery contract per origin chain.

use gasless_types::Address;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct PeripheryRegistry {
	contracts: HashMap<u64, Address>,
}

impl PeripheryRegistry {
	pub fn new(contracts: HashMap<u64, Address>) -> Self {
		Self { contracts }
	}

	pub fn resolve(&self, chain_id: u64) -> Option<Address> {
		self.contracts.get(&chain_id).copied()
	}

	/// `Address` equality is byte equality, so checksum casing on the wire
	/// does not matter. Unknown chains are never canonical.
	pub fn is_canonical(&self, chain_id: u64, to: Address) -> bool {
		self.resolve(chain_id) == Some(to)
	}
}
