//! Error types shared between the symbol server and its clients.
//!
//! `SymbolError` unifies I/O, serialization, provider, endpoint and lifecycle
//! failures so every crate in the workspace can propagate a single error type
//! with `?`. Per-exchange failures (`Provider`, `Timeout`, `FetchExhausted`,
//! `EndpointBind`, `ExchangeNotAvailable`) are contained by the server at the
//! exchange boundary; only `StartupFatal` is expected to end the process.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by server and client.
#[derive(Error, Debug)]
pub enum SymbolError {
    /// I/O error originating from sockets or the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// The metadata provider failed to return details for an exchange.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The metadata provider did not answer within the configured timeout.
    #[error("Timeout fetching {exchange} after {after_ms} ms")]
    Timeout {
        /// Exchange being fetched.
        exchange: String,
        /// Timeout that elapsed, in milliseconds.
        after_ms: u64,
    },

    /// Every fetch attempt for an exchange failed.
    #[error("Failed to fetch {exchange} after {attempts} attempts: {last}")]
    FetchExhausted {
        /// Exchange being fetched.
        exchange: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error of the final attempt.
        last: Box<SymbolError>,
    },

    /// The IPC listener for an exchange could not be opened.
    #[error("Failed to open endpoint for {exchange}: {source}")]
    EndpointBind {
        /// Exchange whose endpoint failed.
        exchange: String,
        /// Underlying socket/filesystem error.
        #[source]
        source: io::Error,
    },

    /// A client asked for an exchange that is not registered.
    #[error("Exchange not available")]
    ExchangeNotAvailable(String),

    /// The exchange key cannot be used as an endpoint name.
    #[error("Invalid exchange key: {0:?}")]
    InvalidKey(String),

    /// The server cannot reach a servable state at all.
    #[error("Startup failed: {0}")]
    StartupFatal(String),

    /// Crossbeam/channel receive failed (e.g., sender closed); contains a short context string.
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for SymbolError {
    fn from(err: PoisonError<T>) -> Self {
        SymbolError::MutexLock(err.to_string())
    }
}
