use anyhow::{Context, Result};
use beacon_server::{AppState, MediaConfig, ServerConfig, router};
use clap::Parser;
use colored::*;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "One-to-many WebRTC broadcast signaling server")]
struct Args {
    /// Interface to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Route that accepts signaling WebSocket upgrades.
    #[arg(long, default_value = "/one2many")]
    ws_path: String,

    /// JSON-RPC WebSocket endpoint of the Kurento media server.
    #[arg(long, env = "MEDIA_SERVER_URI", default_value = "ws://localhost:8888/kurento")]
    media_server_uri: String,

    /// Upper bound on every media server call, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    call_timeout_ms: u64,

    #[arg(long, default_value_t = 240)]
    keepalive_secs: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind: SocketAddr::new(self.host, self.port),
            ws_path: self.ws_path,
            media: MediaConfig {
                uri: self.media_server_uri,
                call_timeout: Duration::from_millis(self.call_timeout_ms),
                keepalive_interval: Duration::from_secs(self.keepalive_secs),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("beacon=info,beacon_server=info")),
        )
        .init();

    let config = Args::parse().into_config();
    if !config.ws_path.starts_with('/') {
        anyhow::bail!("WebSocket path must start with '/': {}", config.ws_path);
    }

    let state = Arc::new(AppState::with_kurento(&config));
    let app = router(state.clone(), &config.ws_path);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    println!("{}", "📡 Beacon signaling server".green().bold());
    println!("   🔌 Signaling: ws://{}{}", config.bind, config.ws_path);
    println!("   🎥 Media:     {}", config.media.uri);
    info!("Listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Releasing media resources");
    state.negotiator.shutdown().await;
    println!("{}", "👋 Server stopped".cyan());

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
