use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single record block was discarded. Never stops the stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("the block must contain 2 parts separated by a blank line, found {found}")]
    WrongPartCount { found: usize },

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("field not found: {0}")]
    FieldNotFound(&'static str),

    #[error("unable to cast \"{value}\" to {kind} for field \"{field}\"{}", detail_suffix(.detail))]
    CastFailure {
        field: &'static str,
        kind: &'static str,
        value: String,
        detail: Option<String>,
    },

    #[error("block is not valid UTF-8: {0}")]
    InvalidUtf8(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" ({detail})"),
        None => String::new(),
    }
}

impl Rejection {
    /// Schema field the rejection is about, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::FieldNotFound(field) | Self::CastFailure { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Conditions that end the stream.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("the provided file doesn't exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("buffer size must be positive")]
    InvalidBufferSize,

    #[error("failed to initialize zstd decoder for '{}': {source}", .path.display())]
    Decoder { path: PathBuf, source: io::Error },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(
        "buffer too small for this record, increase buffer size. Current size: {buffer_size}, unmatched window: {window_len} bytes"
    )]
    BufferTooSmall {
        buffer_size: usize,
        window_len: usize,
    },
}
