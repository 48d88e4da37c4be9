use core::fmt::{Debug, Display};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "courts.toml";
pub const ENV_PREFIX: &str = "COURTS_";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Where the HTTP command surface listens.
    pub listen_address: SocketAddr,
    /// Directory holding the snapshot files.
    pub data_dir: PathBuf,
    /// Stations created at startup when none were restored.
    pub initial_stations: usize,
    /// Fixes the first-round shuffle, mostly useful for demos and tests.
    pub seed: Option<u64>,
    /// Default tracing filter, `RUST_LOG` takes precedence.
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3000)),
            data_dir: PathBuf::from("data"),
            initial_stations: 2,
            seed: None,
            log: "info".to_owned(),
        }
    }
}

#[derive(thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Figment(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Figment(Box::new(value))
    }
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Defaults, overridden by `courts.toml`, overridden by `COURTS_*` environment variables.
#[must_use]
pub fn figment() -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(CONFIG_FILE))
        .merge(Env::prefixed(ENV_PREFIX))
}

pub fn get_config() -> Result<Config, ConfigError> {
    Ok(figment().extract()?)
}
