//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gasless-relay")]
#[command(about = "Gasless deposit relay", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
	/// Path to configuration file
	#[arg(
		short,
		long,
		value_name = "FILE",
		env = "GASLESS_CONFIG",
		default_value = "config/gasless.toml"
	)]
	pub config: PathBuf,

	/// Log level, used when RUST_LOG is not set
	#[arg(short, long, env = "GASLESS_LOG_LEVEL", default_value = "info")]
	pub log_level: String,

	#[command(subcommand)]
	pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
	/// Serve the HTTP API
	Start,
	/// Load and validate the configuration file
	Validate,
	/// Run one pull pass and print the accepted batch as JSON
	Pull {
		/// Override queue.max_messages_per_pull
		#[arg(long)]
		max: Option<u32>,
	},
}
