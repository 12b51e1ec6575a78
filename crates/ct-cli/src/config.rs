//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Path to the board description read as the host.
    pub board_path: PathBuf,
    /// How often `ct watch` re-reads the store.
    pub poll_interval_secs: u64,
    /// How often `ct watch` redraws live totals between reads.
    pub tick_interval_ms: u64,
    /// Field separator for delimited exports.
    pub csv_delimiter: char,
    /// How long a write waits on another session holding the database.
    pub busy_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("ct.db"),
            board_path: data_dir.join("board.json"),
            poll_interval_secs: 5,
            tick_interval_ms: 1000,
            csv_delimiter: ',',
            busy_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // CT_DATABASE_PATH, CT_BOARD_PATH, ...
        figment = figment.merge(Env::prefixed("CT_"));

        let config: Self = figment.extract()?;
        // quotes and line breaks would corrupt the quoting of CSV fields
        if matches!(config.csv_delimiter, '"' | '\n' | '\r') {
            return Err(figment::Error::from(format!(
                "csv_delimiter cannot be {:?}",
                config.csv_delimiter
            )));
        }
        Ok(config)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Returns the platform-specific config directory for ct.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ct"))
}

/// Returns the platform-specific data directory for ct.
///
/// On Linux: `~/.local/share/ct`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("ct"))
}
