#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use server::config::{CliArgs, ServerConfig};
use server::telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry(&config)?;

    tracing::info!(
        grpc_addr = %config.grpc_addr,
        rest_addr = %config.rest_addr,
        "starting servers"
    );
    if cfg!(debug_assertions) {
        tracing::debug!("full config: {config:#?}");
    }

    let outcome = server::bootstrap::run(&config).await;
    if let Err(e) = &outcome {
        tracing::error!(error = %e, "fatal");
    } else {
        tracing::info!("servers shut down");
    }

    providers.shutdown();
    Ok(outcome?)
}
