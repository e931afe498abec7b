use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bsatn_core::{AlgebraicValue, BsatnResult, ProductSchema};

use super::decoder::{FnRowDecoder, RowDecoder};
use super::delegate::ConnectionDelegate;
use super::DbConnection;
use crate::config::ConnectionConfig;
use crate::error::ClientResult;
use crate::protocol::Compression;

pub struct DbConnectionBuilder {
    config: ConnectionConfig,
    delegate: Option<Weak<dyn ConnectionDelegate>>,
    decoders: HashMap<String, Arc<dyn RowDecoder>>,
}

impl Default for DbConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DbConnectionBuilder {
    pub fn new() -> Self {
        Self::from_config(ConnectionConfig::default())
    }

    pub fn from_config(config: ConnectionConfig) -> Self {
        Self {
            config,
            delegate: None,
            decoders: HashMap::new(),
        }
    }

    pub fn with_uri(mut self, uri: &str) -> Self {
        self.config.uri = uri.to_string();
        self
    }

    pub fn with_database(mut self, database: &str) -> Self {
        self.config.database = database.to_string();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.config.token = token;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    pub fn with_light_mode(mut self, light: bool) -> Self {
        self.config.light_mode = light;
        self
    }

    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    pub fn reconnect_backoff(mut self, base: Duration, max: Duration, jitter: Duration) -> Self {
        self.config.reconnect_base_delay = base;
        self.config.reconnect_max_delay = max;
        self.config.reconnect_jitter = jitter;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = timeout;
        self
    }

    /// The connection keeps only a weak reference; the caller owns the delegate.
    pub fn with_delegate<D: ConnectionDelegate + 'static>(mut self, delegate: &Arc<D>) -> Self {
        let delegate: Arc<dyn ConnectionDelegate> = delegate.clone();
        self.delegate = Some(Arc::downgrade(&delegate));
        self
    }

    pub fn with_table<T, F>(mut self, table: &str, schema: ProductSchema, decode: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Vec<AlgebraicValue>) -> BsatnResult<T> + Send + Sync + 'static,
    {
        self.decoders.insert(
            table.to_string(),
            Arc::new(FnRowDecoder::new(schema, decode)),
        );
        self
    }

    pub fn build(self) -> ClientResult<DbConnection> {
        self.config.validate()?;
        Ok(DbConnection::from_parts(
            self.config,
            self.delegate,
            self.decoders,
        ))
    }

    /// Build and connect in one step.
    pub async fn connect(self) -> ClientResult<DbConnection> {
        let conn = self.build()?;
        conn.connect().await?;
        Ok(conn)
    }
}
