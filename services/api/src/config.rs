//! Service configuration read from the environment

use config::{Config, ConfigError, Environment};
use media::StorageConfig;
use serde::Deserialize;

/// Where documents are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persistence {
    #[default]
    Postgres,
    /// Process memory, for local development without a database
    Memory,
}

/// HTTP server settings (`BIND_ADDRESS`, `PORT`, `CORS_ORIGIN`, `PERSISTENCE`)
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    #[serde(default)]
    pub persistence: Persistence,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5003
}

fn default_cors_origin() -> String {
    "http://localhost:5174".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            persistence: Persistence::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageConfig,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(Environment::default())
            .build()?;
        Self::from_config(config)
    }

    /// Both sections read the same flat key space.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        Ok(Self {
            server: config.clone().try_deserialize()?,
            storage: config.try_deserialize()?,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}
