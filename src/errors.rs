// errors.rs
use std::fmt;

/// Errors that abort the current run: database failures or anything else
/// unexpected below the reconciliation layer. Per-source fetch/parse
/// problems are handled locally and never become a TrackerError.
#[derive(Debug)]
pub enum TrackerError {
    Db(String),
    Internal(String),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Db(msg) => write!(f, "Database error: {msg}"),
            TrackerError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<rusqlite::Error> for TrackerError {
    fn from(e: rusqlite::Error) -> Self {
        TrackerError::Db(e.to_string())
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        TrackerError::Db(format!("Bad stored JSON: {e}"))
    }
}
