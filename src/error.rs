//! Centralized error types for mailfile.

use std::path::PathBuf;
use thiserror::Error;

/// Structural errors: the node (or, at the top level, the whole decode) they
/// occur in cannot produce a meaningful tree.
#[derive(Error, Debug)]
pub enum MailError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Mail file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file is neither an RFC 822 message nor a Compound File container.
    #[error("Unsupported mail file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// A header line is neither `Name: value` nor a continuation line.
    #[error("Malformed header line: {line:?}")]
    MalformedHeader { line: String },

    /// A `multipart/*` entity without a `boundary` parameter.
    #[error("Multipart content type without boundary parameter")]
    MissingBoundary,

    /// No delimiter line for the declared boundary was found in the body.
    #[error("Multipart boundary '{boundary}' not found in body")]
    BoundaryNotFound { boundary: String },

    /// The closing `--boundary--` delimiter never appeared.
    #[error("Multipart body for boundary '{boundary}' is not terminated")]
    UnterminatedMultipart { boundary: String },

    /// The Compound File container could not be opened or traversed.
    #[error("Invalid compound file: {0}")]
    InvalidCompoundFile(String),

    /// An export operation failed.
    #[error("Export error: {0}")]
    Export(String),
}

/// Convenience alias for `Result<T, MailError>`.
pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (in-memory streams handed to the decoders).
impl From<std::io::Error> for MailError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<stream>"),
            source,
        }
    }
}

/// Non-fatal charset conversion failure.
///
/// Every backend in the fallback chain rejected the charset; `partial` holds
/// the best decode that could be produced anyway.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CharsetError {
    #[error("No decoder accepted charset '{charset}'")]
    Unsupported { charset: String, partial: String },
}

impl CharsetError {
    /// The best-effort text produced despite the failure.
    pub fn partial(&self) -> &str {
        match self {
            Self::Unsupported { partial, .. } => partial,
        }
    }

    /// Consume the error, keeping the best-effort text.
    pub fn into_partial(self) -> String {
        match self {
            Self::Unsupported { partial, .. } => partial,
        }
    }
}

/// Non-fatal failure to recover the originating IP from `Received` headers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("No Received header present")]
    MissingReceived,

    #[error("No bracketed address in the last Received header")]
    AddressNotFound,
}
