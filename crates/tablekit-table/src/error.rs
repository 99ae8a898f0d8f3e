use thiserror::Error;

/// Errors that can occur during table operations.
#[derive(Debug, Error)]
pub enum TableError {
    /// The connection configuration is invalid. Raised at construction time.
    #[error("Invalid connection config: {0}")]
    Config(String),

    /// An error originating from the embedded SQLite database.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An error originating from the MySQL pool or driver.
    #[error("MySQL error: {0}")]
    MySql(#[from] sqlx::Error),

    /// The blocking task running a SQLite statement panicked or was cancelled.
    #[error("Blocking task failed: {0}")]
    Blocking(String),

    /// The gateway was closed; no further statements can run.
    #[error("Gateway is closed")]
    Closed,

    /// A result column could not be converted to JSON.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Every key of an update map was rejected; no `SET` clause can be built.
    #[error("No assignable columns in update data")]
    NoAssignments,

    /// An insert was requested with no columns.
    #[error("Row must have at least one field")]
    EmptyRow,

    /// An insert reported a row count other than one.
    #[error("Insert affected {0} rows, expected 1")]
    InsertMismatch(u64),
}

impl TableError {
    /// True when the backend itself failed (connection, SQL, constraint),
    /// as opposed to a request that was rejected before reaching it.
    pub fn is_backend_fault(&self) -> bool {
        matches!(
            self,
            TableError::Sqlite(_)
                | TableError::MySql(_)
                | TableError::Blocking(_)
                | TableError::Closed
                | TableError::Decode(_)
        )
    }
}

impl From<tokio::task::JoinError> for TableError {
    fn from(e: tokio::task::JoinError) -> Self {
        TableError::Blocking(e.to_string())
    }
}
