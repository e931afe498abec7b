//! Frame envelope: compression tag, brotli (de)compression and top-level
//! message encode/decode.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use bsatn_core::{from_bytes, to_bytes, BsatnError};
use tracing::trace;

use super::client_message::ClientMessage;
use super::server_message::ServerMessage;
use crate::error::{ClientError, ClientResult};

/// Hard cap on a decompressed payload (256 MiB).
pub const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

const MIN_DECOMPRESS_BUFFER: usize = 1024 * 1024;
const MAX_INITIAL_BUFFER: usize = 64 * 1024 * 1024;
const DECOMPRESS_RATIO_HINT: usize = 50;

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_LG_WINDOW: u32 = 22;

/// Compression applied to server frames and to nested query updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    None,
    #[default]
    Brotli,
    Gzip,
}

impl Compression {
    pub const NONE_TAG: u8 = 0;
    pub const BROTLI_TAG: u8 = 1;
    pub const GZIP_TAG: u8 = 2;

    pub fn tag(self) -> u8 {
        match self {
            Compression::None => Self::NONE_TAG,
            Compression::Brotli => Self::BROTLI_TAG,
            Compression::Gzip => Self::GZIP_TAG,
        }
    }

    pub fn from_tag(tag: u8) -> ClientResult<Self> {
        match tag {
            Self::NONE_TAG => Ok(Compression::None),
            Self::BROTLI_TAG => Ok(Compression::Brotli),
            Self::GZIP_TAG => Ok(Compression::Gzip),
            other => Err(BsatnError::unsupported_tag("frame compression", other).into()),
        }
    }

    /// Value of the `compression` query parameter on the subscribe URL.
    pub fn as_query_param(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Brotli => "Brotli",
            Compression::Gzip => "Gzip",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query_param())
    }
}

impl FromStr for Compression {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "brotli" => Ok(Compression::Brotli),
            "gzip" => Ok(Compression::Gzip),
            other => Err(ClientError::Config(format!(
                "unknown compression '{}', expected none, brotli or gzip",
                other
            ))),
        }
    }
}

/// Decompress a brotli payload, refusing anything larger than
/// [`MAX_DECOMPRESSED_SIZE`].
pub fn decompress_brotli(data: &[u8]) -> ClientResult<Vec<u8>> {
    let capacity = data
        .len()
        .saturating_mul(DECOMPRESS_RATIO_HINT)
        .clamp(MIN_DECOMPRESS_BUFFER, MAX_INITIAL_BUFFER);
    let mut out = Vec::with_capacity(capacity);

    let decoder = brotli::Decompressor::new(data, BROTLI_BUFFER_SIZE);
    decoder
        .take(MAX_DECOMPRESSED_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| ClientError::Decompression(format!("brotli: {}", e)))?;

    if out.len() > MAX_DECOMPRESSED_SIZE {
        return Err(ClientError::Decompression(format!(
            "decompressed payload exceeds {} bytes",
            MAX_DECOMPRESSED_SIZE
        )));
    }

    trace!("brotli: {} -> {} bytes", data.len(), out.len());
    Ok(out)
}

pub fn compress_brotli(data: &[u8]) -> ClientResult<Vec<u8>> {
    let mut writer = brotli::CompressorWriter::new(
        Vec::with_capacity(data.len() / 2),
        BROTLI_BUFFER_SIZE,
        BROTLI_QUALITY,
        BROTLI_LG_WINDOW,
    );
    writer
        .write_all(data)
        .map_err(|e| ClientError::Compression(format!("brotli: {}", e)))?;
    Ok(writer.into_inner())
}

/// Undo the compression named by `compression`; gzip is never supported.
pub(crate) fn decompress(compression: Compression, data: &[u8]) -> ClientResult<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Brotli => decompress_brotli(data),
        Compression::Gzip => Err(ClientError::UnsupportedCompression(
            "gzip payloads are not supported".to_string(),
        )),
    }
}

/// Decode one inbound binary frame.
pub fn decode_server_frame(frame: &[u8]) -> ClientResult<ServerMessage> {
    let (&tag, payload) = frame.split_first().ok_or(BsatnError::InsufficientData {
        needed: 1,
        remaining: 0,
    })?;

    match Compression::from_tag(tag)? {
        Compression::None => Ok(from_bytes(payload)?),
        compression => {
            let raw = decompress(compression, payload)?;
            Ok(from_bytes(&raw)?)
        }
    }
}

/// Build an inbound frame, as a server would.
pub fn encode_server_frame(msg: &ServerMessage, compression: Compression) -> ClientResult<Vec<u8>> {
    let payload = to_bytes(msg);
    let body = match compression {
        Compression::None => payload,
        Compression::Brotli => compress_brotli(&payload)?,
        Compression::Gzip => {
            return Err(ClientError::UnsupportedCompression(
                "gzip payloads are not supported".to_string(),
            ))
        }
    };

    let mut frame = Vec::with_capacity(body.len() + 1);
    frame.push(compression.tag());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Client frames carry no compression byte.
pub fn encode_client_message(msg: &ClientMessage) -> Vec<u8> {
    to_bytes(msg)
}

pub fn decode_client_message(frame: &[u8]) -> ClientResult<ClientMessage> {
    Ok(from_bytes(frame)?)
}
