use anyhow::{Context, Result};
use clap::Parser;
use gasless_config::{Config, ConfigLoader};
use gasless_core::RelayEngine;
use gasless_service::api::ApiServer;
use gasless_service::cli::{Cli, Command};
use gasless_service::factory::engine_builder;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	// Initialize tracing
	setup_tracing(&cli.log_level)?;

	// Handle commands
	match cli.command {
		Some(Command::Start) | None => start_service(&cli.config).await,
		Some(Command::Validate) => validate_config(&cli.config).await,
		Some(Command::Pull { max }) => pull_once(&cli.config, max).await,
	}
}

async fn load_config(path: &Path) -> Result<Config> {
	info!("Loading configuration from: {:?}", path);
	ConfigLoader::new()
		.with_file(path)
		.load()
		.await
		.context("Failed to load configuration")
}

fn build_engine(config: Config) -> Result<RelayEngine> {
	engine_builder(config)
		.build()
		.context("Failed to build relay engine")
}

async fn start_service(path: &Path) -> Result<()> {
	let config = load_config(path).await?;
	info!("Starting {}", config.relay.name);

	let host = config.api.host.clone();
	let port = config.api.port;
	let engine = Arc::new(build_engine(config)?);

	ApiServer::new(host, port, engine)
		.run(setup_shutdown_signal())
		.await?;

	info!("Gasless relay stopped");
	Ok(())
}

async fn validate_config(path: &Path) -> Result<()> {
	let config = load_config(path).await?;
	let name = config.relay.name.clone();
	let cache = config.cache.primary.clone();
	let queue = config.queue.primary.clone();
	let indexer = config.indexer.primary.clone();
	let chains = config.periphery.len();

	build_engine(config)?;

	info!("Configuration is valid");
	info!("Relay name: {}", name);
	info!("Cache: {}, queue: {}, indexer: {}", cache, queue, indexer);
	info!("Periphery contracts configured for {} chain(s)", chains);
	Ok(())
}

async fn pull_once(path: &Path, max: Option<u32>) -> Result<()> {
	let mut config = load_config(path).await?;
	if let Some(max) = max {
		config.queue.max_messages_per_pull = max;
		gasless_config::validate_config(&config).context("Invalid --max")?;
	}

	let engine = build_engine(config)?;
	let batch = engine
		.pull_consumer()
		.collect(chrono::Utc::now())
		.await
		.context("Pull pass failed")?;

	println!("{}", serde_json::to_string_pretty(&batch)?);
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	info!("Shutdown signal received");
}
