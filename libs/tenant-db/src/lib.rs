#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Relational store client for the tenant service.
//!
//! [`Db`] owns the connection pool. Work is done through a [`Session`]:
//!
//! - [`Db::session`] runs every statement on the pool;
//! - [`Db::with_transaction`] hands out a session whose first write opens a
//!   transaction, and commits or rolls back once the closure finishes;
//! - [`Db::begin_bound`] opens a transaction eagerly and hands out sessions bound to it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend};
use sea_orm_migration::MigratorTrait;

pub mod config;
pub mod error;
pub mod lazy_tx;
pub mod serde_duration;
pub mod session;

pub use config::DbConfig;
pub use error::DbError;
pub use lazy_tx::{TxOutcome, TxStats};
pub use session::{BoundTx, DbRunner, Session};

use lazy_tx::{ActiveTx, TxCounters};

/// Shared handle to the connection pool. Cheap to clone.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

struct DbInner {
    conn: DatabaseConnection,
    tx_timeout: Duration,
    counters: TxCounters,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("backend", &self.backend())
            .field("tx_timeout", &self.inner.tx_timeout)
            .finish_non_exhaustive()
    }
}

impl Db {
    /// Opens the pool described by `cfg`.
    ///
    /// # Errors
    /// Returns an error if the DSN is empty or the pool cannot connect.
    #[tracing::instrument(skip(cfg), fields(max_conns = cfg.max_conns, min_conns = cfg.min_conns))]
    pub async fn connect(cfg: &DbConfig) -> Result<Self, DbError> {
        if cfg.dsn.trim().is_empty() {
            return Err(DbError::Database(sea_orm::DbErr::Custom(
                "database dsn is not configured".to_owned(),
            )));
        }
        let conn = Database::connect(cfg.connect_options()).await?;
        tracing::info!(backend = ?conn.get_database_backend(), "connected to database");
        Ok(Self::from_connection(conn, cfg.tx_timeout))
    }

    /// Wraps an existing connection.
    #[must_use]
    pub fn from_connection(conn: DatabaseConnection, tx_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(DbInner {
                conn,
                tx_timeout,
                counters: TxCounters::default(),
            }),
        }
    }

    #[must_use]
    pub fn backend(&self) -> DbBackend {
        self.inner.conn.get_database_backend()
    }

    /// A session that runs every statement directly on the pool.
    #[must_use]
    pub fn session(&self) -> Session {
        Session::pooled(self.clone())
    }

    /// Runs `f` inside a lazily opened transaction. See [`Session::with_transaction`].
    ///
    /// # Errors
    /// Returns `f`'s error unchanged, or the commit failure converted into `E`.
    pub async fn with_transaction<T, E, F, Fut>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        self.session().with_transaction(f).await
    }

    /// Opens a transaction now and returns a handle that hands out sessions bound to it.
    ///
    /// # Errors
    /// Returns the `BEGIN` failure.
    pub async fn begin_bound(&self) -> Result<BoundTx, DbError> {
        let tx = ActiveTx::begin(&self.inner.conn, self.inner.tx_timeout, &self.inner.counters)
            .await?;
        Ok(BoundTx::new(self.clone(), tx))
    }

    /// Applies all pending migrations of `M`.
    ///
    /// # Errors
    /// Returns the migration failure.
    pub async fn migrate<M: MigratorTrait>(&self) -> Result<(), DbError> {
        M::up(&self.inner.conn, None).await?;
        Ok(())
    }

    /// Counters of transactions begun, committed and rolled back through this pool.
    #[must_use]
    pub fn tx_stats(&self) -> TxStats {
        self.inner.counters.snapshot()
    }

    /// Round-trips a trivial statement on the pool.
    ///
    /// # Errors
    /// Returns the driver error when the database is unreachable.
    pub async fn ping(&self) -> Result<(), DbError> {
        self.inner.conn.ping().await?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &DatabaseConnection {
        &self.inner.conn
    }

    pub(crate) fn tx_timeout(&self) -> Duration {
        self.inner.tx_timeout
    }

    pub(crate) fn counters(&self) -> &TxCounters {
        &self.inner.counters
    }
}
