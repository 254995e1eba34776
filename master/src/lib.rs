//! Master Node - cluster status aggregator
//!
//! Central server that:
//! - Accepts fixed-width status records pushed by reporters (`POST /in`)
//! - Keeps the latest record per node in memory
//! - Renders all nodes as a sorted plaintext table (`GET /`)

pub mod config;
pub mod http;
pub mod state;

use config::MasterConfig;
use state::AppState;
use tracing::info;

/// Build-time version info.
pub mod version {
    /// Release version string.
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

/// Bind the configured address and serve until the server fails.
///
/// A bind failure is returned immediately; it is the one fatal condition
/// of the aggregator.
pub async fn serve(config: MasterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(&config);
    let app = http::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
