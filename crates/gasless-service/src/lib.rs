//! Service wiring for the gasless relay.
//!
//! - `api`: HTTP endpoints for submission, push ingestion and pending reads
//! - `cli`: command-line interface
//! - `factory`: maps configured implementation names to backend constructors

pub mod api;
pub mod cli;
pub mod factory;
