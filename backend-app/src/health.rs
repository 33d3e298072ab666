//! Database connectivity check.

use backend_db::{DbError, SessionSource, with_session};

/// Opens a session, runs `SELECT 1` and closes it.
pub async fn check_database<S: SessionSource + ?Sized>(source: &S) -> Result<(), DbError> {
    with_session(source, |mut session| async move {
        let one = session.fetch_scalar_i64("SELECT 1").await?;
        if one != 1 {
            tracing::warn!(value = one, "Unexpected result from SELECT 1");
        }
        session.close().await
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_db::{EngineStats, build_engine};

    #[tokio::test]
    async fn test_check_database_closes_its_session() {
        let engine = build_engine("sqlite::memory:").unwrap();

        check_database(&engine).await.unwrap();

        assert_eq!(engine.stats(), EngineStats { opened: 1, closed: 1 });
    }

    #[tokio::test]
    async fn test_check_database_reports_acquisition_failure() {
        let engine = backend_db::Engine::build(
            "mysql://u:p@127.0.0.1:1/n",
            backend_db::EngineOptions {
                max_connections: 1,
                acquire_timeout: std::time::Duration::from_millis(300),
            },
        )
        .unwrap();

        let err = check_database(&engine).await.unwrap_err();
        assert!(matches!(err, DbError::SessionAcquisition(_)));
    }
}
