//! Client configuration, read from the environment

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::store::{FileStore, KeyValueStore, MemoryStore, StoreError};

pub const BASE_URL_VAR: &str = "STORE_API_BASE_URL";
pub const TOKEN_FILE_VAR: &str = "CART_TOKEN_FILE";
pub const TIMEOUT_VAR: &str = "STORE_API_TIMEOUT_SECS";
pub const USER_AGENT_VAR: &str = "STORE_API_USER_AGENT";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Store API root, always ending in `/` so endpoint paths join beneath it.
    pub base_url: Url,
    /// Where the cart token is persisted; in-memory when unset.
    pub token_file: Option<PathBuf>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            token_file: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> { Self::from_lookup(|key| std::env::var(key).ok()) }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(BASE_URL_VAR).filter(|v| !v.trim().is_empty()).ok_or(ConfigError::Missing(BASE_URL_VAR))?;
        let mut config = Self::new(&base_url)?;
        config.token_file = lookup(TOKEN_FILE_VAR).filter(|v| !v.trim().is_empty()).map(PathBuf::from);
        if let Some(raw) = lookup(TIMEOUT_VAR) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue { key: TIMEOUT_VAR, value: raw.clone() })?;
            if secs == 0 { return Err(ConfigError::InvalidValue { key: TIMEOUT_VAR, value: raw }); }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(agent) = lookup(USER_AGENT_VAR).filter(|v| !v.trim().is_empty()) { config.user_agent = agent; }
        Ok(config)
    }

    pub fn open_store(&self) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        Ok(match &self.token_file {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        })
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl { url: raw.to_string(), reason };
    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") { return Err(invalid(format!("unsupported scheme {}", url.scheme()))); }
    if url.cannot_be_a_base() { return Err(invalid("not a base URL".into())); }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
