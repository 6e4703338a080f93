//! Server configuration
//!
//! Layered: built-in defaults, then an optional TOML file (`quill.toml`, or
//! the path in `QUILL_CONFIG`), then `QUILL_*` environment variables.

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::fmt;

pub const DEFAULT_JWT_SECRET: &str = "change-me-in-production";
const DEFAULT_CONFIG_FILE: &str = "quill.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub storage: StorageBackend,
    pub database_path: String,
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    pub seed_demo_data: bool,
    pub log_level: String,
}

impl ServerConfig {
    /// Load from the default locations
    pub fn load() -> anyhow::Result<Self> {
        let path =
            std::env::var("QUILL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Load with `path` as the config file; a missing file is not an error
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let config = Config::builder()
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("storage", "memory")?
            .set_default("database_path", "data/quill.db")?
            .set_default("jwt_secret", DEFAULT_JWT_SECRET)?
            .set_default("token_ttl_hours", 168_i64)?
            .set_default("seed_demo_data", true)?
            .set_default("log_level", "info")?
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("QUILL").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours as i64)
    }
}
