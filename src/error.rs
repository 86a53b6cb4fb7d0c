//! Error types for transcribeq.
//!
//! Exhaustion is not an error: see [`crate::model::Allocation::Exhausted`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    /// Another participant consumed the last slot. Callers re-allocate.
    #[error("work item {work_item} already has {quota} transcriptions in {language}")]
    QuotaExceeded {
        work_item: String,
        language: String,
        quota: u32,
    },

    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("store still failing after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether retrying the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transient(_) => true,
            Error::Database(e) => is_transient_sqlx(e),
            _ => false,
        }
    }
}

/// Serialization failures, deadlocks, pool exhaustion and I/O hiccups are
/// worth another attempt; everything else is not.
fn is_transient_sqlx(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40001" | "40P01")),
        _ => false,
    }
}

pub type Result<T> = std::result::Result<T, Error>;
