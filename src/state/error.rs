//! Error types for the ledger.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while writing the ledger. Loading never fails: a missing or
/// unreadable ledger is treated as empty.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write ledger to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
