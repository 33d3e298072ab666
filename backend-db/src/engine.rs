//! Process-wide database engine.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backend_settings::redact_url;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use url::Url;

use crate::error::DbError;
use crate::session::Session;

/// Connection pool limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Session bookkeeping shared by an engine and its sessions.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    opened: AtomicU64,
    closed: AtomicU64,
}

impl Counters {
    pub(crate) fn record_open(&self) {
        self.opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_close(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of session counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub opened: u64,
    pub closed: u64,
}

impl EngineStats {
    /// Sessions handed out and not yet closed.
    pub fn active(&self) -> u64 {
        self.opened.saturating_sub(self.closed)
    }
}

/// Something that hands out sessions.
///
/// Request-handling code depends on this rather than on [`Engine`].
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn get_session(&self) -> Result<Session, DbError>;
}

/// Handle to the connection pool. Cheap to clone; build it once at startup.
#[derive(Debug, Clone)]
pub struct Engine {
    pool: AnyPool,
    counters: Arc<Counters>,
    url: String,
}

/// Builds an engine for `uri` with default pool limits.
///
/// See [`Engine::build`].
pub fn build_engine(uri: &str) -> Result<Engine, DbError> {
    Engine::build(uri, EngineOptions::default())
}

impl Engine {
    /// Validates `uri` and creates a lazily connecting pool.
    ///
    /// Accepts `mysql`, `mariadb` and `sqlite` URIs. A `+driver` suffix on
    /// the scheme (`mysql+pymysql://...`) is stripped. Nothing is connected
    /// here, so an unreachable server only shows up on the first session.
    ///
    /// The pool runs its maintenance on the current Tokio runtime; without
    /// one this fails with [`DbError::ConnectionConfiguration`].
    pub fn build(uri: &str, options: EngineOptions) -> Result<Self, DbError> {
        let url = normalize_uri(uri)?;

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(DbError::ConnectionConfiguration(
                "no async runtime: build the engine inside a Tokio runtime".to_string(),
            ));
        }

        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect_lazy(url.as_str())
            .map_err(|e| DbError::ConnectionConfiguration(e.to_string()))?;

        let redacted = redact_url(&url);
        tracing::info!(
            url = %redacted,
            max_connections = options.max_connections,
            acquire_timeout = ?options.acquire_timeout,
            "Database engine ready"
        );

        Ok(Self {
            pool,
            counters: Arc::new(Counters::default()),
            url: redacted,
        })
    }

    /// Opens a session: acquires a pooled connection and begins a
    /// transaction on it.
    pub async fn get_session(&self) -> Result<Session, DbError> {
        let tx = self.pool.begin().await.map_err(|e| {
            tracing::warn!(url = %self.url, error = %e, "Failed to acquire session");
            DbError::SessionAcquisition(e)
        })?;
        Ok(Session::new(tx, Arc::clone(&self.counters)))
    }

    /// Runs `work` with a fresh session.
    ///
    /// The session is moved into `work` and closed when `work` finishes,
    /// whichever way it finishes.
    pub async fn with_session<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        with_session(self, work).await
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            opened: self.counters.opened.load(Ordering::Relaxed),
            closed: self.counters.closed.load(Ordering::Relaxed),
        }
    }

    /// The connection URI with its password masked.
    pub fn redacted_url(&self) -> &str {
        &self.url
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Closes the pool. Outstanding sessions finish first.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(url = %self.url, "Database engine closed");
    }
}

#[async_trait]
impl SessionSource for Engine {
    async fn get_session(&self) -> Result<Session, DbError> {
        Engine::get_session(self).await
    }
}

/// Runs `work` with a session from `source`; see [`Engine::with_session`].
pub async fn with_session<S, F, Fut, T, E>(source: &S, work: F) -> Result<T, E>
where
    S: SessionSource + ?Sized,
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<DbError>,
{
    let session = source.get_session().await?;
    work(session).await
}

fn normalize_uri(uri: &str) -> Result<Url, DbError> {
    let mut url = Url::parse(uri)
        .map_err(|e| DbError::ConnectionConfiguration(format!("invalid database URI: {}", e)))?;

    let scheme = url.scheme().to_string();
    let dialect = scheme.split_once('+').map_or(scheme.as_str(), |(d, _)| d);

    match dialect {
        "mysql" | "mariadb" => {
            if url.host_str().is_none_or(str::is_empty) {
                return Err(DbError::ConnectionConfiguration(format!(
                    "{} URI has no host",
                    dialect
                )));
            }
        }
        "sqlite" => {}
        other => {
            return Err(DbError::ConnectionConfiguration(format!(
                "unsupported database scheme '{}'",
                other
            )));
        }
    }

    if dialect != scheme {
        url.set_scheme(dialect).map_err(|_| {
            DbError::ConnectionConfiguration(format!("cannot rewrite scheme '{}'", scheme))
        })?;
    }

    Ok(url)
}
