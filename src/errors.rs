//! Error hierarchy for the watch engine and the failover layer
//!
//! Misuse (double start, bad options, invalid configuration) is reported
//! synchronously through [`Error`]. Poll failures never reach API callers;
//! they are logged and retried by the watch engine itself.

use std::time::Duration;

use config::ConfigError;

use crate::CacheState;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration validation or loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Illegal lifecycle transition, e.g. a second `start()`
    #[error("Cannot transition cache from {current:?} to {target:?}")]
    IllegalState {
        current: CacheState,
        target: CacheState,
    },

    /// Programmer error detected at the call site
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Host selection gave up
    #[error(transparent)]
    Failover(#[from] FailoverError),

    /// Connection-level failure, no response was received
    #[error(transparent)]
    Transport(TransportError),

    /// The backend answered, but not with something a poller can use
    #[error("Unexpected response status {status}: {body}")]
    UnexpectedStatus { status: http::StatusCode, body: String },

    /// Response headers or body could not be decoded
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The scheduling runtime could not be built or is gone
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FailoverError {
    /// No candidate was viable, nothing was attempted
    #[error("No viable host available for {uri}")]
    NoViableHost { uri: String },

    /// The strategy ran out of candidates mid-sequence
    #[error("Unable to determine a viable host after {attempts} failed attempts")]
    NoViableHostRemaining { attempts: usize },

    /// Every attempt failed at the transport level
    #[error("Reached max failover attempts ({max}), giving up")]
    MaxAttemptsExceeded {
        max: usize,
        #[source]
        source: TransportError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket connect failed
    #[error("Connect to {address} failed: {message}")]
    Connect { address: String, message: String },

    /// No response within the effective read timeout
    #[error("Request to {address} timed out after {duration:?}")]
    Timeout { address: String, duration: Duration },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Request could not be built, e.g. invalid URI after rewrite
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A failover router in the transport chain gave up
    #[error(transparent)]
    Failover(Box<FailoverError>),

    #[error("Transport failure: {source}")]
    Other {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<FailoverError> for TransportError {
    fn from(e: FailoverError) -> Self {
        TransportError::Failover(Box::new(e))
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Failover(e) => Error::Failover(*e),
            other => Error::Transport(other),
        }
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::InvalidArgument(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
