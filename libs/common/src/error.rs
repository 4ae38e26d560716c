//! Error types shared by every store implementation

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Failure reported by a persistent (or in-memory) store
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred while acquiring a connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred while applying the schema
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A unique constraint rejected the write; carries the offending field
    #[error("Duplicate value for {0}")]
    Duplicate(String),
}

impl DatabaseError {
    /// Classify a query failure, turning unique violations into [`DatabaseError::Duplicate`].
    ///
    /// The field is recovered from the constraint name (`users_email_key` -> `email`).
    pub fn from_query(err: SqlxError) -> Self {
        let duplicate = err
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .map(|db| field_from_constraint(db.constraint().unwrap_or_default()));

        match duplicate {
            Some(field) => DatabaseError::Duplicate(field),
            None => DatabaseError::Query(err),
        }
    }

    /// True when the error is a unique-constraint violation on `field`.
    pub fn is_duplicate_of(&self, field: &str) -> bool {
        matches!(self, DatabaseError::Duplicate(f) if f == field)
    }
}

fn field_from_constraint(constraint: &str) -> String {
    // Postgres names implicit unique constraints `<table>_<column>_key`.
    let trimmed = constraint.strip_suffix("_key").unwrap_or(constraint);
    match trimmed.split_once('_') {
        Some((_table, column)) if !column.is_empty() => column.to_string(),
        _ => trimmed.to_string(),
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_names_map_to_columns() {
        assert_eq!(field_from_constraint("users_email_key"), "email");
        assert_eq!(field_from_constraint("users_username_key"), "username");
        assert_eq!(field_from_constraint("custom"), "custom");
    }

    #[test]
    fn duplicate_matches_only_its_field() {
        let err = DatabaseError::Duplicate("email".to_string());
        assert!(err.is_duplicate_of("email"));
        assert!(!err.is_duplicate_of("username"));
        assert!(!DatabaseError::Migration("x".into()).is_duplicate_of("email"));
    }
}
