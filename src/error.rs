use std::time::Duration;

use bsatn_core::BsatnError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Codec error: {0}")]
    Codec(#[from] BsatnError),

    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Not connected")]
    Disconnected,

    #[error("One-off query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUri(err.to_string())
    }
}

impl ClientError {
    /// True for failures that only poison a single frame, not the session.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            ClientError::Codec(_)
                | ClientError::UnsupportedCompression(_)
                | ClientError::Decompression(_)
        )
    }
}
