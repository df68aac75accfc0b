//! Error types
//!
//! Failures are surfaced to the caller as-is. Nothing in this crate retries
//! or swallows an error.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while building, executing, or logging an exchange
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing a snapshot file failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A snapshot could not be encoded or decoded
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The client has no base URL and the request resource is relative
    #[error("client has no base URL configured")]
    MissingBaseUrl,

    /// A URL could not be parsed or joined
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A header parameter has a name or value HTTP cannot carry
    #[error("invalid header: {name}")]
    InvalidHeader { name: String },

    /// The underlying HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A `Set-Cookie` header did not contain a cookie
    #[error("invalid Set-Cookie header: {0}")]
    InvalidSetCookie(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The underlying I/O error kind, if this is a file-system failure
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;
