//! Error types for introspection and execution.

use oxide_schema::SchemaError;

/// Errors that can occur while talking to a live database.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The database could not be reached or the URL is not understood.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A statement was rejected by the database.
    #[error("Query failed: {message}\nSQL: {sql}")]
    QueryFailed {
        /// The statement that failed.
        sql: String,
        /// Driver error message.
        message: String,
    },

    /// An operation failed while applying a batch.
    ///
    /// `applied` operations before `index` were committed (savepoint mode)
    /// or rolled back together with the failing one (atomic mode, where
    /// `applied` is zero).
    #[error("Operation #{index} ({operation}) failed: {message}\nSQL: {sql}")]
    TransactionFailed {
        /// Description of the failing operation.
        operation: String,
        /// Position of the failing operation in the batch.
        index: usize,
        /// The statement that failed.
        sql: String,
        /// Driver error message.
        message: String,
        /// Operations that remain applied.
        applied: usize,
    },

    /// Schema synthesis, diffing or rendering failed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// IO error (reading metadata, writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrateError {
    pub(crate) fn query_failed(sql: &str, message: impl ToString) -> Self {
        Self::QueryFailed {
            sql: sql.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn connection_failed(message: impl ToString) -> Self {
        Self::ConnectionFailed(message.to_string())
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
