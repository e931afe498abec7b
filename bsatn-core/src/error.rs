//! Error types for bsatn-core.
//!
//! Every decoding failure aborts only the value being parsed; callers decide
//! whether that is fatal to anything larger.

use thiserror::Error;

/// BSATN codec error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BsatnError {
    #[error("Insufficient data: needed {needed} bytes, {remaining} remaining")]
    InsufficientData { needed: usize, remaining: usize },

    #[error("Unsupported tag {tag} for {context}")]
    UnsupportedTag { context: &'static str, tag: u8 },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Invalid bool byte: {0:#04x}")]
    InvalidBool(u8),
}

/// Result type for BSATN operations
pub type BsatnResult<T> = Result<T, BsatnError>;

impl BsatnError {
    pub fn unsupported_tag(context: &'static str, tag: u8) -> Self {
        BsatnError::UnsupportedTag { context, tag }
    }

    pub fn invalid_structure(msg: impl Into<String>) -> Self {
        BsatnError::InvalidStructure(msg.into())
    }
}
