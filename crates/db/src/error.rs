//! Errors raised by the execution store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// The pool could not open its first connection.
    #[error("cannot reach the execution store: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("row not found")]
    NotFound,

    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A value does not fit its column, or a stored value does not decode
    /// back into its domain type.
    #[error("{table}.{column}: {message}")]
    InvalidColumn {
        table: &'static str,
        column: &'static str,
        message: String,
    },
}

impl DbError {
    pub fn invalid_column(table: &'static str, column: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidColumn {
            table,
            column,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_column_names_its_location() {
        let err = DbError::invalid_column("workflow_executions", "status", "unknown status 'exploded'");
        assert_eq!(err.to_string(), "workflow_executions.status: unknown status 'exploded'");
    }
}
