//! Error types for Sentra
//!
//! Provides a unified error type hierarchy for the entire system.

use thiserror::Error;

/// Result type alias using Sentra's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Sentra
#[derive(Error, Debug)]
pub enum Error {
    // Storage Errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // Network Errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    // Protocol Errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // Broker-reported wire errors (client side)
    #[error("Broker returned error code {0}")]
    Broker(i16),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Event envelope errors (fraud pipeline)
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    // IO Errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Storage-related errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Corrupt log: {0}")]
    CorruptLog(String),
}

/// Network-related errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Not a group member: join a group before fetching")]
    NotJoined,
}

/// Protocol-related errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Truncated message")]
    Truncated,

    #[error("Invalid length prefix: {0}")]
    InvalidLength(i64),

    #[error("Invalid UTF-8 in string field")]
    InvalidString,

    #[error("Frame of {0} bytes exceeds maximum")]
    FrameTooLarge(usize),

    #[error("Unknown API key: {0}")]
    UnknownApiKey(i16),

    #[error("Correlation id mismatch: expected {expected}, got {actual}")]
    CorrelationMismatch { expected: i32, actual: i32 },
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
