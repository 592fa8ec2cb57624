//! Persistence error types.

use thiserror::Error;

/// Errors raised while loading or flushing the persisted store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading, writing or renaming the store file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV reader or writer failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
