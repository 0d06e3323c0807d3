// ⚙️ Configuration - optional roll-call.json, every field defaulted

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::weighting::WeightConfig;

pub const DEFAULT_CONFIG_FILE: &str = "roll-call.json";

fn default_database_path() -> PathBuf {
    PathBuf::from("roll-call.db")
}

fn default_reveal_delay_ms() -> u64 {
    800
}

fn default_auto_roll_interval_ms() -> u64 {
    3000
}

fn default_recent_records_limit() -> usize {
    10
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file holding the roster and the attendance log
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Pause between "start roll" and revealing the selected name
    #[serde(default = "default_reveal_delay_ms")]
    pub reveal_delay_ms: u64,

    /// Fixed delay between automatic rolls
    #[serde(default = "default_auto_roll_interval_ms")]
    pub auto_roll_interval_ms: u64,

    /// Rows shown in the recent-records panel
    #[serde(default = "default_recent_records_limit")]
    pub recent_records_limit: usize,

    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    #[serde(default)]
    pub weights: WeightConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            reveal_delay_ms: default_reveal_delay_ms(),
            auto_roll_interval_ms: default_auto_roll_interval_ms(),
            recent_records_limit: default_recent_records_limit(),
            export_dir: default_export_dir(),
            weights: WeightConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        config
            .weights
            .validate()
            .with_context(|| format!("Invalid config {}", path.display()))?;

        Ok(config)
    }

    /// Explicit path must exist; otherwise fall back to ./roll-call.json or defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::load(local);
        }

        Ok(Self::default())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn auto_roll_interval(&self) -> Duration {
        Duration::from_millis(self.auto_roll_interval_ms)
    }

    /// Log file kept next to the database
    pub fn log_path(&self) -> PathBuf {
        self.database_path.with_extension("log")
    }
}
