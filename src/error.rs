//! Error types for tag statistics.

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for statistics operations.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Statistics store is locked by another process")]
    Locked,

    #[error("Statistics store not initialized")]
    NotInitialized,

    #[error("Unknown statistics key: {0}")]
    UnknownStatisticsKey(String),

    #[error("Statistics key already registered: {0}")]
    DuplicateStatisticsKey(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Tag value source failed: {0}")]
    Source(String),

    #[error("Event bus closed")]
    BusClosed,
}

impl From<serde_json::Error> for StatsError {
    fn from(e: serde_json::Error) -> Self {
        StatsError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StatsError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StatsError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StatsError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StatsError::Deserialization(e.to_string())
    }
}

/// Result type for statistics operations.
pub type Result<T> = std::result::Result<T, StatsError>;
