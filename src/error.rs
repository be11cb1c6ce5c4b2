//! Error types for waveprint

use thiserror::Error;
use uuid::Uuid;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the fingerprinting engine.
///
/// CPU pipeline stages (spectrogram, peaks, hashing) produce no domain
/// errors; everything they cannot handle is a programming fault. The
/// decoder, the index, and the downloader surface recoverable errors to
/// the owning job.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid environment configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio cannot be read or decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Post-decode peak amplitude below the audible floor
    #[error("Input audio is silent (peak amplitude {0:.2e})")]
    SilentInput(f32),

    /// Database fault surfaced by sqlx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database fault that persisted through retries
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unknown job id
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    /// Downloader or metadata fetch failed
    #[error("External error: {0}")]
    External(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal fault (worker task failure)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is a storage fault (used by the batch-ingest
    /// aggregate failure rule).
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Storage(_))
    }
}
