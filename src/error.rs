//! Error types shared by the session and its gateways.
//!
//! None of these cross the consumer-facing surface of `TranslationSession`:
//! `t`, `set_current_language` and `set_current_app` absorb them and log.
//! They surface only from gateway implementations and from
//! `save_translation_for_language`, whose caller may want the outcome.

use thiserror::Error;

/// Failures of the local persisted-language medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file does not hold a JSON object of strings
    #[error("storage contents could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The medium refused the operation (e.g. quota, disabled storage)
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by a remote key-value store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Opening or continuing a read at `path` failed
    #[error("read of '{path}' failed: {message}")]
    Read { path: String, message: String },

    /// A merge write at `path` failed
    #[error("write to '{path}' failed: {message}")]
    Write { path: String, message: String },

    /// The store cannot be reached at all
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

/// Errors of the translation session itself.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// `t` received something other than a non-empty string
    #[error("invalid lookup input: {0}")]
    InvalidLookupInput(String),

    /// A write was requested without one of its path components
    #[error("missing write parameter: {0}")]
    MissingWriteParameters(&'static str),

    #[error(transparent)]
    RemoteRead(RemoteError),

    #[error(transparent)]
    RemoteWrite(RemoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The session was mounted outside of a tokio runtime
    #[error("no tokio runtime available to drive the session")]
    NoRuntime,
}

/// Result type for session operations
pub type TranslationResult<T> = Result<T, TranslationError>;
