use crate::constants::{DEFAULT_PORT, DEFAULT_UNDO_STACK_SIZE};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level configuration shared across slices.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfigInner {
    pub server: ServerConfig,
    pub rules: RulesConfig,
    pub logging: LoggingConfig,
}

/// Arc-wrapped so slices can hold a copy cheaply.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(flatten, default)]
    inner: Arc<ApiConfigInner>,
}

impl Deref for ApiConfig {
    type Target = ApiConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ApiConfig {
    fn deref_mut(&mut self) -> &mut ApiConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    pub ssl: Option<SslConfig>,
    /// Seconds in-flight requests get to finish after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SslConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Where rulesets live and how much history a character keeps.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Directory holding `ruleset.yaml` (or json/toml) and its definition tree.
    pub ruleset_dir: PathBuf,
    /// Undo entries kept per character.
    pub undo_stack_size: usize,
    /// Refuse to start when definitions fail to load instead of skipping them.
    pub strict: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub filter: Option<String>,
    pub path: Option<PathBuf>,
    pub rotation: String,
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: DEFAULT_PORT, ssl: None, shutdown_grace_secs: 10 }
    }
}

impl Default for SslConfig {
    fn default() -> Self {
        Self { cert: PathBuf::from("cert.pem"), key: PathBuf::from("key.pem") }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            ruleset_dir: PathBuf::from("rules"),
            undo_stack_size: DEFAULT_UNDO_STACK_SIZE,
            strict: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            filter: None,
            path: None,
            rotation: "daily".to_owned(),
            json: false,
        }
    }
}
