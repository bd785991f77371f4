//! Docker socket guard.
//!
//! Listens on TCP and forwards calls to the container-engine socket only
//! when the route file allows them.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────┐
//!                  │                   SOCKET GUARD                     │
//!   Client         │  ┌─────────┐    ┌───────────┐    ┌─────────────┐   │
//!   ───────────────┼─▶│  http   │───▶│  policy   │───▶│ net::unix   │───┼──▶ engine.sock
//!                  │  │ server  │    │ director  │    │  upstream   │   │
//!                  │  └─────────┘    └─────┬─────┘    └─────────────┘   │
//!   ◀──────────────┼── 400/401/403 JSON ◀──┘                            │
//!                  │                                                    │
//!                  │  config → routing::RouteTable (immutable, shared)  │
//!                  └────────────────────────────────────────────────────┘
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use socket_guard::config::load_config;
use socket_guard::http::HttpServer;
use socket_guard::lifecycle::signals::shutdown_signal;
use socket_guard::net::UnixUpstream;
use socket_guard::observability::{logging, metrics};
use socket_guard::policy::Director;

#[derive(Debug, Parser)]
#[command(name = "socket-guard")]
#[command(about = "Allow-list proxy in front of the container engine socket", long_about = None)]
struct Cli {
    /// Route file to read the allow-list from (JSON, or TOML by extension).
    #[arg(long, default_value = "routes.json")]
    config: PathBuf,

    /// Path to the engine socket.
    #[arg(long, default_value = "/var/run/docker.sock")]
    upstream: PathBuf,

    /// Port to listen on.
    #[arg(long, default_value_t = 2375)]
    port: u16,

    /// Address to bind the listener to.
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    /// Show debug logging, including decoded bodies and match traces.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug);

    tracing::info!("socket-guard v{} starting", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli.config)?;
    let director = Director::from_config(&config)?;

    for route in director.table().routes() {
        tracing::info!(
            method = ?route.method(),
            pattern = route.pattern(),
            check_param = route.check_param.len(),
            check_json = route.check_json.len(),
            check_filter = route.check_filter.len(),
            append_filter = route.append_filter.len(),
            "Route allowed"
        );
    }
    tracing::info!(
        path = %cli.config.display(),
        routes = director.table().len(),
        match_mode = ?config.match_mode,
        "Configuration loaded"
    );

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr);
    }

    let listener = TcpListener::bind(SocketAddr::new(cli.bind, cli.port)).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        upstream = %cli.upstream.display(),
        "Listening for connections"
    );

    let server = HttpServer::new(Arc::new(director), UnixUpstream::new(cli.upstream));
    server.run(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
