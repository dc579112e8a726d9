use std::fmt;

use spotcheck_recon::ReconError;

#[derive(Debug)]
pub enum StoreError {
    /// No ledger row carries this id.
    NotFound { mismatch_id: i64 },
    /// Caller supplied a malformed argument (null ignore status, blank issue id, ...).
    InvalidArgument(String),
    /// Report cannot be recorded or merged.
    InvalidReport(String),
    /// Engine rejected the merge.
    Recon(ReconError),
    /// SQLite failure. The surrounding transaction has been rolled back.
    Sqlite(String),
    /// A JSON or timestamp column could not be encoded or decoded.
    Serialization(String),
    /// A thread panicked while holding a store lock.
    LockPoisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { mismatch_id } => write!(f, "mismatch {mismatch_id} not found"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::InvalidReport(msg) => write!(f, "invalid report: {msg}"),
            Self::Recon(e) => write!(f, "{e}"),
            Self::Sqlite(msg) => write!(f, "database error: {msg}"),
            Self::Serialization(msg) => write!(f, "serialization error: {msg}"),
            Self::LockPoisoned => write!(f, "store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Recon(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<ReconError> for StoreError {
    fn from(e: ReconError) -> Self {
        match e {
            ReconError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            ReconError::InvalidReport(msg) => Self::InvalidReport(msg),
            other => Self::Recon(other),
        }
    }
}
