//! Connection configuration
//!
//! [`ConnectionConfig`] carries everything needed to open (and re-open) a
//! session. It is usually filled in through
//! [`DbConnectionBuilder`](crate::client::DbConnectionBuilder) or loaded from
//! the environment with [`ConnectionConfig::from_env`].

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::protocol::Compression;

pub const DEFAULT_URI: &str = "http://localhost:3000";
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Subprotocol negotiated on every WebSocket handshake.
pub const WS_SUBPROTOCOL: &str = "v1.bsatn.spacetimedb";

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address; `http`, `https`, `ws` and `wss` schemes are accepted.
    pub uri: String,
    pub database: String,
    /// Bearer token; replaced by the server-issued token once one arrives.
    pub token: Option<String>,
    pub compression: Compression,
    /// Ask for `TransactionUpdateLight` instead of full transaction updates.
    pub light_mode: bool,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub reconnect_jitter: Duration,
    pub query_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            database: String::new(),
            token: None,
            compression: Compression::Brotli,
            light_mode: false,
            auto_reconnect: true,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_jitter: Duration::from_secs(1),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Load from `BSATN_*` environment variables, reading `.env` first if
    /// present. Unset variables keep their defaults; call
    /// [`validate`](Self::validate) once the config is complete.
    pub fn from_env() -> ClientResult<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();
        if let Ok(uri) = env::var("BSATN_URI") {
            config.uri = uri;
        }
        if let Ok(database) = env::var("BSATN_DATABASE") {
            config.database = database;
        }
        config.token = env::var("BSATN_TOKEN").ok().filter(|t| !t.is_empty());
        if let Ok(compression) = env::var("BSATN_COMPRESSION") {
            config.compression = compression.parse()?;
        }
        if let Ok(attempts) = env::var("BSATN_MAX_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = attempts.parse().map_err(|_| {
                ClientError::Config(format!(
                    "BSATN_MAX_RECONNECT_ATTEMPTS must be a number, got '{}'",
                    attempts
                ))
            })?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.database.is_empty() {
            return Err(ClientError::Config("database name is required".to_string()));
        }
        if self.compression == Compression::Gzip {
            return Err(ClientError::UnsupportedCompression(
                "gzip cannot be requested; use brotli or none".to_string(),
            ));
        }
        if self.reconnect_base_delay > self.reconnect_max_delay {
            return Err(ClientError::Config(
                "reconnect base delay exceeds the maximum delay".to_string(),
            ));
        }
        self.subscribe_url().map(|_| ())
    }

    /// `{ws|wss}://host/v1/database/{db}/subscribe?compression=...`
    pub fn subscribe_url(&self) -> ClientResult<Url> {
        let mut url = self.base_url(true)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUri(self.uri.clone()))?
            .pop_if_empty()
            .extend(["v1", "database", self.database.as_str(), "subscribe"]);
        url.query_pairs_mut()
            .append_pair("compression", self.compression.as_query_param());
        if self.light_mode {
            url.query_pairs_mut().append_pair("light", "true");
        }
        Ok(url)
    }

    /// `{http|https}://host/v1/identity`
    pub fn identity_url(&self) -> ClientResult<Url> {
        let mut url = self.base_url(false)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUri(self.uri.clone()))?
            .pop_if_empty()
            .extend(["v1", "identity"]);
        Ok(url)
    }

    fn base_url(&self, websocket: bool) -> ClientResult<Url> {
        let mut url = Url::parse(&self.uri)?;
        let secure = match url.scheme() {
            "http" | "ws" => false,
            "https" | "wss" => true,
            other => {
                return Err(ClientError::InvalidUri(format!(
                    "unsupported scheme '{}' in {}",
                    other, self.uri
                )))
            }
        };
        let scheme = match (websocket, secure) {
            (true, false) => "ws",
            (true, true) => "wss",
            (false, false) => "http",
            (false, true) => "https",
        };

        if url.host_str().is_none() {
            return Err(ClientError::InvalidUri(format!("missing host in {}", self.uri)));
        }

        url.set_scheme(scheme)
            .map_err(|_| ClientError::InvalidUri(self.uri.clone()))?;
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }
}
