use thiserror::Error;

/// Postgres error code for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

/// Errors surfaced by the job and audit stores and the cleaner built on top of them.
#[derive(Error, Debug)]
pub enum CleanerError {
    #[error("store unavailable during {command}: {reason}")]
    StoreUnavailable { command: String, reason: String },
    #[error("{command} query failed with: {reason}")]
    QueryFailed { command: String, reason: String },
    #[error("caller is not authorized")]
    Unauthorized,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl CleanerError {
    pub fn unavailable(command: &str, reason: impl ToString) -> Self {
        CleanerError::StoreUnavailable {
            command: command.to_owned(),
            reason: reason.to_string(),
        }
    }

    /// Classify a sqlx error raised while running `command`.
    /// Missing tables and connection level failures mean the store is unavailable, anything
    /// else the database rejected is a failed query.
    pub fn from_sqlx(command: &str, error: sqlx::Error) -> Self {
        let unavailable = match &error {
            sqlx::Error::Database(db_error) => db_error.code().as_deref() == Some(UNDEFINED_TABLE),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => true,
            _ => false,
        };

        if unavailable {
            CleanerError::unavailable(command, error)
        } else {
            CleanerError::QueryFailed {
                command: command.to_owned(),
                reason: error.to_string(),
            }
        }
    }
}

/// Table names are interpolated into query text, so they are validated before any store is built.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TableNameError {
    #[error("table name {0:?} must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidCharacters(String),
    #[error("table name {name:?} is {length} characters long, the limit is {limit}")]
    TooLong {
        name: String,
        length: usize,
        limit: usize,
    },
    #[error("tables must have distinct names, {0:?} is used twice")]
    Duplicate(String),
}
