//! vior-daemon: the VIOR referral rewards daemon.
//!
//! Single OS process running a Tokio async runtime. The site backend talks
//! to the daemon via JSON-RPC over a Unix socket. Every request opens its
//! own store connection on the blocking pool; the store serializes writers.

mod commands;
mod config;
mod rpc;

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;
use tracing::{error, info};
use vior_referral::query::Leaderboard;
use vior_referral::ReferralError;

use crate::config::DaemonConfig;
use crate::rpc::{RpcError, RpcServer};

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Configuration.
    pub config: DaemonConfig,
    /// Path of the migrated ledger database.
    pub db_path: PathBuf,
    /// Cached leaderboard snapshot.
    pub leaderboard: Leaderboard,
}

impl DaemonState {
    /// Build state over an already migrated database.
    pub fn new(config: DaemonConfig, db_path: PathBuf) -> Self {
        let leaderboard = Leaderboard::new(config.staleness(), config.leaderboard.max_limit);
        Self {
            config,
            db_path,
            leaderboard,
        }
    }

    /// Run `f` against a fresh connection on the blocking pool.
    pub async fn with_conn<T, F>(&self, f: F) -> Result<T, RpcError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, ReferralError> + Send + 'static,
    {
        let path = self.db_path.clone();
        let timeout = self.config.busy_timeout();
        tokio::task::spawn_blocking(move || {
            let mut conn = vior_db::connect(&path, timeout)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RpcError::internal_error(&format!("worker failed: {e}")))?
        .map_err(RpcError::from)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("vior={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!("VIOR daemon starting");

    config.rewards.validate()?;
    let data_dir = config.data_dir();

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open and migrate the database once; requests reconnect per call
    let db_path = data_dir.join("vior.db");
    drop(vior_db::open_with_timeout(&db_path, config.busy_timeout())?);
    info!(path = ?db_path, "ledger database ready");

    // 3. Build daemon state
    let socket_path = config.socket_path();
    let state = Arc::new(DaemonState::new(config, db_path));

    // 4. Start IPC server
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    // 5. Run the RPC server until shutdown
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown
    info!("Daemon shutting down gracefully");

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}
