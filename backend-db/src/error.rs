//! Error types for the database layer.

/// Errors raised while building the engine or using a session.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The connection URI is malformed or names an unsupported database.
    #[error("Connection configuration error: {0}")]
    ConnectionConfiguration(String),

    /// A connection could not be obtained (pool timeout, network failure).
    /// Not retried here.
    #[error("Failed to acquire session: {0}")]
    SessionAcquisition(#[source] sqlx::Error),

    /// The session was already closed.
    #[error("Session is closed")]
    SessionClosed,

    /// The session's transaction was already committed or rolled back.
    #[error("Session transaction already finished")]
    TransactionFinished,

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

impl DbError {
    /// True for failures the caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::SessionAcquisition(_))
    }
}
