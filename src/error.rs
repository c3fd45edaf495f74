use std::time::Duration;
use thiserror::Error;

/// Coarse classification used by callers that only care about the category
/// of a failure, not its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connectivity,
    Protocol,
    EmptyResult,
    Config,
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("inference server unreachable: {0}")]
    Connectivity(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed response from inference server: {0}")]
    Protocol(String),

    #[error("inference server returned HTTP {0}")]
    Status(u16),

    #[error("inference server returned no text")]
    EmptyResult,

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connectivity(_) | Error::Timeout(_) => ErrorKind::Connectivity,
            Error::Protocol(_) | Error::Status(_) => ErrorKind::Protocol,
            Error::EmptyResult => ErrorKind::EmptyResult,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Maps a client error, reporting timeouts against the limit that was in force.
    pub fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            Error::Timeout(timeout)
        } else if e.is_decode() || e.is_body() {
            Error::Protocol(e.to_string())
        } else if let Some(status) = e.status() {
            Error::Status(status.as_u16())
        } else {
            Error::Connectivity(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
