//! Simple round-robin load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                 BALANCER                     │
//!                       │                                              │
//!   Client ─────────────┼─▶ admission ─▶ round-robin ─▶ forwarder ─────┼──▶ Backend
//!                       │     gate        selector     (tcp | http)    │
//!   Client ◀────────────┼───────────────────────────── relay ◀─────────┼─── Backend
//!                       │                                              │
//!                       │  config · logging · metrics · shutdown       │
//!                       └──────────────────────────────────────────────┘
//! ```
//!
//! Over capacity, HTTP clients get `503 too busy` and TCP clients are closed.

use clap::Parser;
use std::path::{Path, PathBuf};

use simple_balancer::config::{read_config, validate_config, ConfigError, Mode, ProxyConfig};
use simple_balancer::lifecycle::{signals, startup, Shutdown};
use simple_balancer::observability::init_logging;

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Debug, Parser)]
#[command(name = "simple-balancer", version, about = "Round-robin TCP/HTTP load balancer")]
struct Cli {
    /// Path to the TOML config file (defaults to ./config.toml when present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Forwarding mode.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Address to bind (e.g. 0.0.0.0).
    #[arg(long)]
    bind: Option<String>,

    /// Port to bind.
    #[arg(long)]
    port: Option<u16>,

    /// Maximum concurrent connections or requests.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Comma-separated backends, replacing those from the file.
    #[arg(long)]
    balancers: Option<String>,
}

impl Cli {
    fn load(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None if Path::new(DEFAULT_CONFIG).exists() => read_config(Path::new(DEFAULT_CONFIG))?,
            None => ProxyConfig::default(),
        };

        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = Some(bind.clone());
        }
        if let Some(port) = self.port {
            config.server.port = Some(port);
        }
        if let Some(max) = self.max_connections {
            config.server.max_connections = Some(max);
        }
        if let Some(balancers) = &self.balancers {
            config.backends.clear();
            config.balancers = Some(balancers.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load()?;
    init_logging(&config.observability);

    let settings = validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!(
        mode = %settings.mode,
        bind_address = %settings.bind_address,
        max_connections = settings.max_connections,
        backends = settings.backends.len(),
        request_timeout_secs = settings.request_timeout.as_secs(),
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        let notified = shutdown.trigger();
        tracing::info!(servers = notified, "Shutdown requested");
    });

    startup::run(settings, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
