//! Custom error types for the common library
//!
//! This module defines the errors reported by the persistence layer. Both the
//! PostgreSQL repositories and their in-memory counterparts use them so the
//! stores above can treat every backend the same way.

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

    /// A unique constraint rejected the write
    #[error("Duplicate value: {0}")]
    Duplicate(String),

    /// The document changed since it was read (version mismatch on save)
    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: &'static str, id: String },
}

impl DatabaseError {
    /// Classify a query failure, singling out unique-key violations.
    pub fn from_query(err: SqlxError) -> Self {
        let duplicate = err
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .map(|db| db.constraint().unwrap_or("unique").to_string());

        match duplicate {
            Some(constraint) => DatabaseError::Duplicate(constraint),
            None => DatabaseError::Query(err),
        }
    }

    /// True when a compare-and-swap save lost the race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict { .. })
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_detected() {
        let err = DatabaseError::Conflict {
            entity: "post",
            id: "42".to_string(),
        };
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "post 42 was modified concurrently");
        assert!(!DatabaseError::Migration("boom".to_string()).is_conflict());
    }

    #[test]
    fn test_non_database_errors_stay_query_errors() {
        let err = DatabaseError::from_query(SqlxError::RowNotFound);
        assert!(matches!(err, DatabaseError::Query(_)));
    }
}
