//! Scoped database sessions.

use std::fmt;
use std::sync::Arc;

use sqlx::{Any, AnyConnection, Transaction};
use uuid::Uuid;

use crate::engine::Counters;
use crate::error::DbError;

/// Lifecycle of a session.
///
/// `Created -> InUse -> (Committed | RolledBack) -> Closed`; a session closed
/// straight from `Created` was never touched. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    InUse,
    Committed,
    RolledBack,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::InUse => "in_use",
            SessionState::Committed => "committed",
            SessionState::RolledBack => "rolled_back",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work on one pooled connection.
///
/// A transaction is open from the moment the session is handed out; nothing
/// is committed unless [`Session::commit`] is called. Dropping or closing a
/// session with an open transaction rolls it back and returns the connection
/// to the pool. A session is counted closed exactly once.
pub struct Session {
    id: Uuid,
    state: SessionState,
    tx: Option<Transaction<'static, Any>>,
    counters: Arc<Counters>,
}

impl Session {
    pub(crate) fn new(tx: Transaction<'static, Any>, counters: Arc<Counters>) -> Self {
        counters.record_open();
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, "Session opened");
        Self {
            id,
            state: SessionState::Created,
            tx: Some(tx),
            counters,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// The underlying connection, inside the session's transaction.
    ///
    /// Use it to run any sqlx query:
    ///
    /// ```ignore
    /// let rows = sqlx::query("SELECT id FROM users")
    ///     .fetch_all(session.connection()?)
    ///     .await?;
    /// ```
    pub fn connection(&mut self) -> Result<&mut AnyConnection, DbError> {
        self.ensure_open()?;
        let tx = self.tx.as_mut().ok_or(DbError::TransactionFinished)?;
        self.state = SessionState::InUse;
        Ok(&mut **tx)
    }

    /// Executes a statement and returns the number of affected rows.
    pub async fn execute(&mut self, sql: &str) -> Result<u64, DbError> {
        let conn = self.connection()?;
        let result = sqlx::query(sql).execute(conn).await?;
        Ok(result.rows_affected())
    }

    /// Runs a query returning a single integer.
    pub async fn fetch_scalar_i64(&mut self, sql: &str) -> Result<i64, DbError> {
        let conn = self.connection()?;
        Ok(sqlx::query_scalar::<_, i64>(sql).fetch_one(conn).await?)
    }

    pub async fn commit(&mut self) -> Result<(), DbError> {
        let tx = self.take_transaction()?;
        match tx.commit().await {
            Ok(()) => {
                self.state = SessionState::Committed;
                tracing::debug!(session = %self.id, "Session committed");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::RolledBack;
                tracing::warn!(session = %self.id, error = %e, "Commit failed");
                Err(e.into())
            }
        }
    }

    pub async fn rollback(&mut self) -> Result<(), DbError> {
        let tx = self.take_transaction()?;
        self.state = SessionState::RolledBack;
        tx.rollback().await?;
        tracing::debug!(session = %self.id, "Session rolled back");
        Ok(())
    }

    /// Rolls back anything uncommitted and releases the connection.
    ///
    /// Calling this on a closed session fails with [`DbError::SessionClosed`].
    pub async fn close(&mut self) -> Result<(), DbError> {
        self.ensure_open()?;
        let result = match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(DbError::from),
            None => Ok(()),
        };
        self.mark_closed();
        result
    }

    fn ensure_open(&self) -> Result<(), DbError> {
        if self.is_closed() {
            return Err(DbError::SessionClosed);
        }
        Ok(())
    }

    fn take_transaction(&mut self) -> Result<Transaction<'static, Any>, DbError> {
        self.ensure_open()?;
        self.tx.take().ok_or(DbError::TransactionFinished)
    }

    fn mark_closed(&mut self) {
        let outcome = match self.state {
            SessionState::Created => "untouched",
            SessionState::InUse => "rolled_back",
            other => other.as_str(),
        };
        self.state = SessionState::Closed;
        self.counters.record_close();
        tracing::debug!(session = %self.id, outcome, "Session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.is_closed() {
            // Dropping the transaction queues its rollback on the connection
            // before the connection goes back to the pool.
            drop(self.tx.take());
            self.mark_closed();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}
