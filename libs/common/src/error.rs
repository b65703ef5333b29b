//! Custom error types for the common library
//!
//! This module defines the database error type shared by every service that
//! talks to PostgreSQL.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// SQLSTATE code reported by PostgreSQL, if the error carries one
    pub fn sql_state(&self) -> Option<String> {
        match self {
            DatabaseError::Connection(err) | DatabaseError::Query(err) => match err {
                SqlxError::Database(db_err) => db_err.code().map(|code| code.into_owned()),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;
