//! Serde helpers for chain-keyed tables.

use gasless_types::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// TOML keys are strings; parse them as chain ids and the values as addresses.
pub fn deserialize_chain_address_map<'de, D>(
	deserializer: D,
) -> Result<HashMap<u64, Address>, D::Error>
where
	D: Deserializer<'de>,
{
	let map = HashMap::<String, String>::deserialize(deserializer)?;

	map.into_iter()
		.map(|(k, v)| {
			let chain_id = k
				.parse::<u64>()
				.map_err(|_| serde::de::Error::custom(format!("Invalid chain ID: {}", k)))?;
			let address = v.parse::<Address>().map_err(|_| {
				serde::de::Error::custom(format!("Invalid address for chain {}: {}", k, v))
			})?;
			Ok((chain_id, address))
		})
		.collect()
}

pub fn serialize_chain_address_map<S>(
	map: &HashMap<u64, Address>,
	serializer: S,
) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let string_map: HashMap<String, String> = map
		.iter()
		.map(|(k, v)| (k.to_string(), v.to_string()))
		.collect();

	string_map.serialize(serializer)
}
