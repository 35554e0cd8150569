use thiserror::Error;

/// Errors produced by payload encode/decode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload encode failed: {0}")]
    Encode(String),

    #[error("payload decode failed: {0}")]
    Decode(String),
}

pub type PayloadResult<T> = Result<T, PayloadError>;
