//! Error types for the cueboard engine
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. The four asset errors are the typed failures surfaced to the
//! command caller; the remaining kinds cover the ambient machinery.

use thiserror::Error;

/// Main error type for the cueboard engine
#[derive(Error, Debug)]
pub enum Error {
    /// The caller supplied an empty asset identifier
    #[error("Invalid asset id: identifier must not be empty")]
    InvalidAssetId,

    /// No registry entry exists for the identifier
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// A preload collided with an identifier that is already registered
    #[error("Asset already exists: {0}")]
    AssetAlreadyExists(String),

    /// The resolved asset path does not exist or is not readable
    #[error("Asset path invalid: {0}")]
    AssetPathInvalid(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
