//! Sitemap router.
//!
//! Routes requests through a declarative processing tree and reports the
//! pipeline (or redirect) each request resolves to.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────────────┐
//!                 │                    SITEMAP ROUTER                     │
//!                 │                                                       │
//!   Request ──────┼─▶ http (axum) ──▶ environment ──▶ routing::Sitemap    │
//!                 │                                     │                 │
//!                 │                       node tree walk (blocking pool)  │
//!                 │                       ├─ wildcard / variables         │
//!                 │                       ├─ components (pool, guards)    │
//!                 │                       └─ pipeline assembler/redirect  │
//!                 │                                     │                 │
//!   Response ◀────┼── http (status, Location, JSON) ◀── Completion        │
//!                 │                                                       │
//!                 │  config (TOML, validation, watcher → ArcSwap reload)  │
//!                 │  observability (tracing, Prometheus) · lifecycle      │
//!                 └───────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use sitemap_router::config::{load_config, ConfigWatcher};
use sitemap_router::environment::RequestEnvironment;
use sitemap_router::http::{apply_config_updates, HttpServer};
use sitemap_router::lifecycle::{CancelToken, Shutdown};
use sitemap_router::observability::{logging, metrics};
use sitemap_router::routing::Sitemap;

#[derive(Debug, Parser)]
#[command(name = "sitemap-router", version, about = "Declarative sitemap routing")]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(short, long, default_value = "sitemap.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the sitemap over HTTP, reloading on config change.
    Serve {
        /// Override `server.bind_address`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Load, validate and build the sitemap, then exit.
    Check,
    /// Route one request and print the result as JSON.
    Route {
        /// Request target, e.g. `/docs/intro.html?lang=en`.
        target: String,
        /// Request header as `name=value`.
        #[arg(long = "header", value_parser = parse_pair)]
        headers: Vec<(String, String)>,
        /// Environment attribute as `name=value`.
        #[arg(long = "attribute", value_parser = parse_pair)]
        attributes: Vec<(String, String)>,
        /// Treat as an internal request.
        #[arg(long)]
        internal: bool,
    },
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init(&config.observability);

    tracing::info!(config = ?cli.config, "sitemap-router v{} starting", env!("CARGO_PKG_VERSION"));

    let sitemap = Sitemap::from_config(&config)?;

    match cli.command {
        Command::Check => {
            println!("{}: configuration OK", cli.config.display());
        }
        Command::Route {
            target,
            headers,
            attributes,
            internal,
        } => {
            let mut env = RequestEnvironment::from_target(&target);
            for (name, value) in &headers {
                env = env.with_header(name, value);
            }
            for (name, value) in &attributes {
                env = env.with_attribute(name, value);
            }
            if internal {
                env = env.internal();
            }
            let completion = sitemap.process(&mut env, CancelToken::new())?;
            println!("{}", serde_json::to_string_pretty(&completion)?);
        }
        Command::Serve { bind } => {
            if config.observability.metrics_enabled {
                match config.observability.metrics_address.parse::<SocketAddr>() {
                    Ok(addr) => metrics::init_metrics(addr),
                    Err(e) => tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        error = %e,
                        "Failed to parse metrics address"
                    ),
                }
            }

            let bind_address = bind.unwrap_or_else(|| config.server.bind_address.clone());
            let listener = TcpListener::bind(&bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");

            let server = HttpServer::new(&config.server, sitemap);

            let (watcher, updates) = ConfigWatcher::new(&cli.config);
            let _watcher = match watcher.run() {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    None
                }
            };
            tokio::spawn(apply_config_updates(server.sitemap(), updates));

            let shutdown = Shutdown::new();
            server.run(listener, shutdown.subscribe()).await?;
            tracing::info!("Shutdown complete");
        }
    }
    Ok(())
}
