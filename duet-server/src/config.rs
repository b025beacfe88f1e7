//! Server configuration.
//!
//! Precedence: environment (`DUET__SERVER__PORT`, ...) > `.env` > config file
//! (`duet.toml`, or the one given with `--config`) > defaults.

use duet_core::IceServerConfig;
use duet_core::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::room::CoordinatorSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct DuetConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub ice: IceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser client assets, served as the fallback route.
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// e.g. `sqlite://duet.db`. Unset keeps history in memory.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub history_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    pub max_message_length: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IceConfig {
    pub stun_urls: Vec<String>,
    pub turn_url: Option<String>,
    pub turn_username: Option<String>,
    pub turn_credential: Option<String>,
}

impl DuetConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name("duet").required(false),
        };

        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("storage.max_connections", 5)?
            .set_default("storage.upload_dir", "./uploads")?
            .set_default("storage.max_upload_bytes", 25 * 1024 * 1024)?
            .set_default("storage.history_timeout_ms", 2000)?
            .set_default("limits.max_message_length", 4000)?
            .set_default("ice.stun_urls", vec![DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2])?
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("DUET")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("ice.stun_urls")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// ICE servers announced to clients in `welcome`.
    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        let mut servers = Vec::new();
        if !self.ice.stun_urls.is_empty() {
            servers.push(IceServerConfig {
                urls: self.ice.stun_urls.clone(),
                username: None,
                credential: None,
            });
        }
        if let Some(turn) = &self.ice.turn_url {
            servers.push(IceServerConfig {
                urls: vec![turn.clone()],
                username: self.ice.turn_username.clone(),
                credential: self.ice.turn_credential.clone(),
            });
        }
        servers
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            max_message_length: self.limits.max_message_length,
            history_timeout: Duration::from_millis(self.storage.history_timeout_ms),
        }
    }
}
