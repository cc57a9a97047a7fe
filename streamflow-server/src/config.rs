//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::cache::CacheConfig;
use crate::mirror::MirrorConfig;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_CACHE_DIR: &str = "station_cache";
const DEFAULT_STATIC_DIR: &str = "static";

/// Invalid configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable could not be parsed
    #[error("{name}: invalid value {value:?}")]
    Invalid { name: &'static str, value: String },

    /// The mirror list was set but contained no usable URL
    #[error("STREAMFLOW_MIRRORS: no mirrors given")]
    NoMirrors,
}

/// Everything the server binary needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub addr: SocketAddr,
    /// Mirror list and per-mirror timeout
    pub mirrors: MirrorConfig,
    /// Cache TTL and key prefix
    pub cache: CacheConfig,
    /// Directory for persisted cache entries
    pub cache_dir: PathBuf,
    /// Directory holding the UI bundle
    pub static_dir: PathBuf,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    ///
    /// Unset and empty variables fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let addr_value = var("STREAMFLOW_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_value.parse().map_err(|_| ConfigError::Invalid {
            name: "STREAMFLOW_ADDR",
            value: addr_value.clone(),
        })?;

        let mut mirrors = match var("STREAMFLOW_MIRRORS") {
            Some(list) => MirrorConfig::new(parse_mirrors(&list)?),
            None => MirrorConfig::default(),
        };

        if let Some(ms) = var("STREAMFLOW_MIRROR_TIMEOUT_MS") {
            let millis: u64 = ms.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "STREAMFLOW_MIRROR_TIMEOUT_MS",
                value: ms.clone(),
            })?;
            mirrors = mirrors.with_timeout(Duration::from_millis(millis));
        }

        Ok(Self {
            addr,
            mirrors,
            cache: CacheConfig::default(),
            cache_dir: var("STREAMFLOW_CACHE_DIR")
                .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string())
                .into(),
            static_dir: var("STREAMFLOW_STATIC_DIR")
                .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())
                .into(),
        })
    }
}

/// Split a comma-separated mirror list, checking each entry is a URL.
fn parse_mirrors(list: &str) -> Result<Vec<String>, ConfigError> {
    let mirrors: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| {
            Url::parse(m)
                .map(|_| m.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Invalid {
                    name: "STREAMFLOW_MIRRORS",
                    value: m.to_string(),
                })
        })
        .collect::<Result<_, _>>()?;

    if mirrors.is_empty() {
        return Err(ConfigError::NoMirrors);
    }
    Ok(mirrors)
}
