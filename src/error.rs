use std::fmt;

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A referenced table, view, or column does not exist in the store.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A facet value that cannot be bound as its column's type.
    #[error("Malformed value for facet {facet}: {value:?}")]
    MalformedFacetValue { facet: String, value: String },

    /// The store cannot be opened or reached. Never degraded to an empty result.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a read operation may swallow this error and answer with an
    /// empty or zero result.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::StoreUnavailable(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        let text = e.to_string();
        match e.sqlite_error_code() {
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::SystemIoFailure
                | ErrorCode::PermissionDenied,
            ) => Error::StoreUnavailable(text),
            _ if is_missing_object(&e) => Error::SchemaMismatch(text),
            _ => Error::Database(text),
        }
    }
}

/// A prepare failure naming a table, view, or column the store lacks.
fn is_missing_object(e: &rusqlite::Error) -> bool {
    fn names_missing(msg: &str) -> bool {
        msg.starts_with("no such table") || msg.starts_with("no such column")
    }

    match e {
        rusqlite::Error::SqliteFailure(err, Some(msg)) => {
            err.code == ErrorCode::Unknown && names_missing(msg)
        }
        rusqlite::Error::SqliteFailure(_, None) => false,
        // Builds with SQLite error offsets report prepare failures as
        // SqlInputError, whose message carries the statement.
        other => {
            let text = other.to_string();
            text.contains("no such table") || text.contains("no such column")
        }
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(e.to_string())
    }
}

/// Failures of the connection thread itself (open, closed channel). Errors
/// raised by statements inside a `call` are returned as the closure's value
/// and classified by `From<rusqlite::Error>` instead.
impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::StoreUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
