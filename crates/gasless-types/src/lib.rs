//! Shared types for the gasless deposit relay.
//!
//! Everything that crosses a crate boundary lives here: the signed deposit
//! intent accepted by the submission endpoint, the envelope published to the
//! queue, the broker's push envelope, the cache-resident pending projection,
//! the indexer's deposit status, the HTTP response bodies, and the
//! configuration schema helpers used by every pluggable backend.

pub mod api;
pub mod envelope;
pub mod indexer;
pub mod intent;
pub mod outcome;
pub mod pending;
pub mod queued;
pub mod validation;
pub mod witness;

pub use api::*;
pub use envelope::*;
pub use indexer::*;
pub use intent::*;
pub use outcome::*;
pub use pending::*;
pub use queued::*;
pub use validation::*;
pub use witness::*;

pub use alloy::primitives::{Address, Bytes, B256, U256};
