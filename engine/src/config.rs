//! Application configuration.
//!
//! Stored as TOML under the platform config directory:
//! - Windows: %APPDATA%/rocket-sync/config.toml
//! - Linux: ~/.config/rocket-sync/config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::EngineError;

/// How tool output is turned into success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionPolicy {
    /// Exit code decides; only lines starting with an error prefix count against success
    #[default]
    ExitCode,
    /// Any `error`/`failed` substring fails; push/pull need `0 skipped`
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Explicit adb executable; resolved automatically when absent
    pub adb_path: Option<PathBuf>,

    /// Device serial passed as `-s`; needed when several devices are attached
    pub serial: Option<String>,

    /// Device folder used for listings, pushes and pulls
    pub remote_dir: String,

    /// Progress probe period in milliseconds
    pub poll_interval_ms: u64,

    pub detection: DetectionPolicy,

    /// `tracing` filter directive used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            adb_path: None,
            serial: None,
            remote_dir: "/sdcard".to_string(),
            poll_interval_ms: 500,
            detection: DetectionPolicy::ExitCode,
            log_filter: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, EngineError> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| EngineError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| EngineError::Config {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Write to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(path, self.to_toml()?).map_err(|e| EngineError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// The settings as they would be written to disk.
    pub fn to_toml(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config {
            message: e.to_string(),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// `<config dir>/rocket-sync/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("rocket-sync");
    path.push("config.toml");
    Some(path)
}

fn adb_file_name() -> &'static str {
    if cfg!(windows) {
        "adb.exe"
    } else {
        "adb"
    }
}

/// Decide which adb executable to run.
///
/// Order: explicit path, then `resources/adb/adb[.exe]` beside the running
/// executable, then plain `adb` looked up on PATH.
pub fn resolve_adb_path(explicit: Option<&Path>) -> PathBuf {
    let resolved = match explicit {
        Some(path) => path.to_path_buf(),
        None => bundled_adb_path()
            .filter(|p| p.is_file())
            .unwrap_or_else(|| PathBuf::from(adb_file_name())),
    };
    info!(adb = %resolved.display(), "resolved adb path");
    resolved
}

fn bundled_adb_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    Some(dir.join("resources").join("adb").join(adb_file_name()))
}
