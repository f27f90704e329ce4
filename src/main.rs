//! API gateway binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::{self, GatewayConfig};
use api_gateway::lifecycle::{spawn_signal_listener, Gateway, Shutdown};
use api_gateway::net::load_tls_config;
use api_gateway::observability::{init_logging, metrics};
use api_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "HTTP API gateway with sessions, OAuth login and rate limiting")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML). Defaults plus environment when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config: GatewayConfig = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::load_from_env()?,
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let gateway = Gateway::assemble(&config)?;
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_max = config.rate_limit.max,
        rate_limit_window_ms = config.rate_limit.window_ms,
        origin_mode = ?config.cors.origin_mode,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let background = gateway.spawn_background(&shutdown);
    spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config.clone(), gateway.pipeline());
    match &config.listener.tls {
        Some(tls) => {
            let addr: SocketAddr = config.listener.bind_address.parse()?;
            let tls = load_tls_config(tls).await?;
            server.run_tls(addr, tls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    shutdown.trigger();
    for task in background {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
