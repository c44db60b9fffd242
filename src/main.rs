//! BFF Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────────┐
//!                      │                       BFF GATEWAY                        │
//!                      │                                                          │
//!   Browser request    │  ┌─────────┐   ┌─────────┐   ┌────────────┐              │
//!   ───────────────────┼─▶│  http   │──▶│ routing │──▶│ translator │              │
//!                      │  │ server  │   │  table  │   └─────┬──────┘              │
//!                      │  └─────────┘   └─────────┘         │                     │
//!                      │                                     ▼                     │
//!                      │                 ┌──────────┐  ┌────────────┐             │
//!                      │                 │  tagged  │◀─│  gateway   │             │
//!                      │                 │  cache   │  │  handler   │             │
//!                      │                 └────▲─────┘  └─────┬──────┘             │
//!                      │                      │ fire         │                    │
//!                      │              ┌───────┴──────┐       ▼                    │
//!                      │              │ invalidation │  ┌────────────┐            │
//!   Response           │              │     bus      │  │  upstream  │◀───────────┼──── Upstream
//!   ◀──────────────────┼──────────────┴──────────────┘  │   client   │            │     API
//!                      │                                 └────────────┘            │
//!                      │  config · observability · security · lifecycle · admin   │
//!                      └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use bff_gateway::config::load_config;
use bff_gateway::lifecycle::{signals, startup, Shutdown};
use bff_gateway::observability::logging;
use clap::Parser;

#[derive(Parser)]
#[command(name = "bff-gateway", version, about = "Backend-for-frontend gateway with a tagged response cache")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "BFF_GATEWAY_CONFIG", default_value = "gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logging needs the config, so load errors go to stderr directly
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {}: {e}", args.config.display());
            return Err(e.into());
        }
    };

    logging::init_tracing(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        routes = config.routes.len(),
        "bff-gateway starting"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    startup::run(config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
