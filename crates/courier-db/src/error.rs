//! Database error types.

use thiserror::Error;

/// Errors returned by the persistence layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Database migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A stored value could not be interpreted (e.g. unknown state string).
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },
}

impl DbError {
    /// Whether this error is a unique-constraint violation.
    ///
    /// The admission path relies on this to fall back to the idempotency
    /// lookup when two identical creates race.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::QueryFailed(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_error_is_not_unique_violation() {
        let err = DbError::QueryFailed(sqlx::Error::RowNotFound);
        assert!(!err.is_unique_violation());

        let err = DbError::CorruptRow {
            table: "messages",
            message: "bad state".into(),
        };
        assert!(!err.is_unique_violation());
    }
}
