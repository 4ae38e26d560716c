//! Service configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `finance.toml`, then `FINANCE__`-prefixed environment variables
//! (`FINANCE__SERVER__PORT=9000`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Largest accepted avatar upload by default (5 MiB)
pub const DEFAULT_AVATAR_MAX_BYTES: i64 = 5 * 1024 * 1024;

/// Where users, tokens and transactions live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Where avatar files live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarBackend {
    S3,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarConfig {
    pub backend: AvatarBackend,
    pub bucket: String,
    /// Custom endpoint for S3-compatible stores
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// Prefix joined with an object key to form its public URL
    pub public_base_url: String,
    pub max_bytes: usize,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageBackend,
    pub avatars: AvatarConfig,
}

impl AppConfig {
    /// Load configuration from defaults, `finance.toml` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name("finance").required(false))
            .add_source(
                Environment::with_prefix("FINANCE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Defaults only, with everything kept in memory
    pub fn in_memory() -> Result<Self, ConfigError> {
        Self::builder()?
            .set_override("storage", "memory")?
            .set_override("avatars.backend", "memory")?
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("storage", "postgres")?
            .set_default("avatars.backend", "memory")?
            .set_default("avatars.bucket", "avatars")?
            .set_default("avatars.public_base_url", "/media")?
            .set_default("avatars.max_bytes", DEFAULT_AVATAR_MAX_BYTES)
    }
}
