//! Quiz Leaderboard Server
//!
//! Serves the in-memory leaderboard until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use quiz_leaderboard::{LeaderboardServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Quiz Leaderboard Server v{}", VERSION);

    let config = ServerConfig::from_env().context("Invalid configuration")?;
    info!("Bind address: {}", config.bind_addr);
    info!("Top-N: {}", config.top_n);
    info!("Max connections: {}", config.max_connections);

    let server = Arc::new(LeaderboardServer::new(config)?);

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;
    info!("Server stopped with {} entries on the board", server.board().len().await);

    Ok(())
}
