//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use diet_core::{DEFAULT_HISTORY_DAYS, PackageName, RefreshConfig, ValidationError};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Trailing days of coarse history merged into each view.
    pub history_days: u32,
    /// Seconds between passes in `diet watch`.
    pub refresh_interval_secs: u64,
    /// The tracker's own package, never counted as usage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_package: Option<String>,
    /// The home-screen launcher, never counted as usage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launcher_package: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("history_days", &self.history_days)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .field("host_package", &self.host_package)
            .field("launcher_package", &self.launcher_package)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("diet.db"),
            history_days: DEFAULT_HISTORY_DAYS,
            refresh_interval_secs: 900,
            host_package: None,
            launcher_package: None,
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

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (DIET_*)
        figment = figment.merge(Env::prefixed("DIET_"));

        figment.extract()
    }

    /// Lock file guarding refresh passes across processes.
    pub fn lock_path(&self) -> PathBuf {
        self.database_path.with_extension("lock")
    }

    /// Refresh tunables with the host and launcher packages excluded.
    pub fn refresh_config(&self) -> Result<RefreshConfig, ValidationError> {
        let excluded_packages = [&self.host_package, &self.launcher_package]
            .into_iter()
            .flatten()
            .map(|package| PackageName::new(package.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RefreshConfig {
            history_days: self.history_days,
            excluded_packages,
        })
    }
}

/// Returns the platform-specific config directory for diet.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("diet"))
}

/// Returns the platform-specific data directory for diet.
///
/// On Linux: `~/.local/share/diet`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("diet"))
}
