// Catalog configuration
// Loaded from ~/.config/billing-catalog/config.toml, BILLING_CATALOG_DB overrides the database path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_DIR: &str = "billing-catalog";
pub const DB_ENV_VAR: &str = "BILLING_CATALOG_DB";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// SQLite file holding items, bills and the audit log
    pub database_path: PathBuf,

    /// Default tracing filter; RUST_LOG wins when set
    pub log_level: String,

    /// Enable WAL journal mode on open
    pub wal: bool,

    /// Stamped on system-data writes
    pub system_version: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: "info".to_string(),
            wal: true,
            system_version: crate::VERSION.to_string(),
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("catalog.db")
}

impl CatalogConfig {
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Config file if present, defaults otherwise, then env overrides
    pub fn load() -> Result<Self> {
        let path = Self::path();
        let config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: CatalogConfig = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_database_override(std::env::var(DB_ENV_VAR).ok())
    }

    fn with_database_override(mut self, value: Option<String>) -> Self {
        if let Some(path) = value.filter(|p| !p.trim().is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        self
    }
}
