use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_HOST: &str = "127.0.0.1";
/// The backend serves HTTP on 8080 and its websocket on the next port.
pub const DEFAULT_WS_PORT: u16 = 8081;
pub const RECONNECT_DELAY: Duration = Duration::from_millis(2000);
pub const STATUS_MESSAGE_TTL: Duration = Duration::from_millis(3000);

pub const HOST_ENV: &str = "AUDIOJONES_HOST";
pub const PORT_ENV: &str = "AUDIOJONES_WS_PORT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid port: {value:?}")]
    BadPort { var: &'static str, value: String },
    #[error("invalid websocket endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub reconnect_delay: Duration,
    pub status_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_WS_PORT,
            reconnect_delay: RECONNECT_DELAY,
            status_ttl: STATUS_MESSAGE_TTL,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `AUDIOJONES_HOST` / `AUDIOJONES_WS_PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup(HOST_ENV) {
            let host = host.trim();
            if !host.is_empty() {
                config.host = host.to_string();
            }
        }

        if let Some(port) = lookup(PORT_ENV) {
            config.port = port.trim().parse().map_err(|_| ConfigError::BadPort {
                var: PORT_ENV,
                value: port.clone(),
            })?;
        }

        Ok(config)
    }

    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        Ok(Url::parse(&format!("ws://{}:{}", self.host, self.port))?)
    }
}
