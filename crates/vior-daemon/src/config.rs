//! Configuration file management.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vior_referral::RewardPolicy;

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Leaderboard settings.
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    /// Request server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
    /// Bonus amounts, redemption floor and catalog. Last so the catalog's
    /// array of tables serializes after every plain value.
    #[serde(default)]
    pub rewards: RewardPolicy,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// How long a transaction waits for the write lock, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Leaderboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Maximum age of a served snapshot, in seconds. 0 disables caching.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: u64,
    /// Largest `limit` a caller may request.
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
    /// `limit` used when the caller omits it.
    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

/// Request server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Public site URL used to build referral links. Empty = no links.
    #[serde(default)]
    pub public_url: String,
    /// Socket path. Empty = $data_dir/vior.sock.
    #[serde(default)]
    pub socket_path: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_busy_timeout_ms() -> u64 {
    vior_db::DEFAULT_BUSY_TIMEOUT.as_millis() as u64
}

fn default_staleness_secs() -> u64 {
    vior_referral::query::DEFAULT_STALENESS.as_secs()
}

fn default_max_limit() -> u32 {
    vior_referral::query::DEFAULT_MAX_LIMIT
}

fn default_limit() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            staleness_secs: default_staleness_secs(),
            max_limit: default_max_limit(),
            default_limit: default_limit(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> PathBuf {
        if self.server.socket_path.is_empty() {
            self.data_dir().join("vior.sock")
        } else {
            PathBuf::from(&self.server.socket_path)
        }
    }

    /// Store lock timeout.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.busy_timeout_ms)
    }

    /// Leaderboard snapshot bound.
    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.leaderboard.staleness_secs)
    }

    /// Shareable link for a referral code, if a public URL is configured.
    pub fn referral_url(&self, code: &str) -> Option<String> {
        let base = self.server.public_url.trim_end_matches('/');
        (!base.is_empty()).then(|| format!("{base}/?ref={code}"))
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Default data directory: `$VIOR_DATA_DIR`, else `~/.vior`.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("VIOR_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".vior"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/vior"))
    }
}
