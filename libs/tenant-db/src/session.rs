//! Request-scoped access to the relational store.
//!
//! A [`Session`] is passed explicitly to every storage call. It decides which
//! connection a statement runs on:
//!
//! 1. the lazy transaction of the enclosing [`crate::Db::with_transaction`] scope,
//! 2. a pre-bound transaction opened with [`crate::Db::begin_bound`],
//! 3. the shared pool.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, ExecResult,
    QueryResult, Statement,
};
use tokio::time::{Instant, timeout_at};

use crate::Db;
use crate::error::{DbError, TX_DEADLINE_EXCEEDED};
use crate::lazy_tx::{ActiveTx, LazyTx, TxOutcome};

/// Explicit request-scoped database handle.
#[derive(Clone)]
pub struct Session {
    db: Db,
    lazy: Option<Arc<LazyTx>>,
    bound: Option<Arc<ActiveTx>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("lazy", &self.lazy.is_some())
            .field("transaction_started", &self.transaction_started())
            .field("bound", &self.bound.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn pooled(db: Db) -> Self {
        Self {
            db,
            lazy: None,
            bound: None,
        }
    }

    /// Returns a statement runner, starting the lazy transaction if this
    /// session has one and it has not begun yet. Use this for writes.
    ///
    /// # Errors
    /// Returns the `BEGIN` failure unchanged. It is not retried.
    pub async fn runner(&self) -> Result<DbRunner<'_>, DbError> {
        if let Some(lazy) = &self.lazy {
            let active = lazy.get_or_begin().await?;
            return Ok(active.runner());
        }
        Ok(self.reader())
    }

    /// Returns a statement runner without ever starting a transaction.
    ///
    /// Reads after a write in the same scope go through the open transaction
    /// and see that write.
    #[must_use]
    pub fn reader(&self) -> DbRunner<'_> {
        if let Some(active) = self.lazy.as_deref().and_then(LazyTx::active) {
            return active.runner();
        }
        if let Some(bound) = &self.bound {
            return bound.runner();
        }
        DbRunner::pool(self.db.conn())
    }

    /// Whether this session carries a lazy transaction holder.
    #[must_use]
    pub fn is_transactional(&self) -> bool {
        self.lazy.is_some() || self.bound.is_some()
    }

    /// Whether the lazy transaction of this session has been opened.
    #[must_use]
    pub fn transaction_started(&self) -> bool {
        self.lazy.as_deref().is_some_and(LazyTx::is_started)
    }

    /// Runs `f` with a derived session that carries a fresh lazy transaction.
    ///
    /// - `f` fails: rolls back if a transaction was started, returns `f`'s error unchanged.
    /// - `f` succeeds: commits only if a transaction was started.
    ///
    /// A pre-bound transaction on `self` stays visible to `f` for reads until
    /// the lazy transaction opens.
    ///
    /// # Errors
    /// Returns `f`'s error, or the commit failure converted into `E`.
    pub async fn with_transaction<T, E, F, Fut>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        let holder = Arc::new(LazyTx::new(self.db.clone()));
        let scoped = Self {
            db: self.db.clone(),
            lazy: Some(Arc::clone(&holder)),
            bound: self.bound.clone(),
        };

        let result = f(scoped).await;

        let holder = match Arc::try_unwrap(holder) {
            Ok(holder) => holder,
            Err(shared) => {
                // A clone of the session outlived the scope; the transaction is
                // rolled back when the last clone drops.
                tracing::error!(
                    started = shared.is_started(),
                    "transaction scope ended while its session is still referenced"
                );
                return match result {
                    Ok(_) => Err(DbError::TxStillShared.into()),
                    Err(e) => Err(e),
                };
            }
        };

        match result {
            Ok(value) => {
                let outcome = holder.commit().await.map_err(|e| {
                    tracing::error!(error = %e, "failed to commit transaction");
                    E::from(e)
                })?;
                tracing::trace!(?outcome, "transaction scope finished");
                Ok(value)
            }
            Err(e) => {
                match holder.rollback().await {
                    Ok(TxOutcome::RolledBack) => tracing::debug!("transaction rolled back"),
                    Ok(TxOutcome::NotStarted | TxOutcome::Committed) => {}
                    Err(rb) => tracing::error!(error = %rb, "failed to roll back transaction"),
                }
                Err(e)
            }
        }
    }
}

/// Explicitly opened transaction shared by the sessions it hands out.
pub struct BoundTx {
    db: Db,
    tx: Arc<ActiveTx>,
}

impl BoundTx {
    pub(crate) fn new(db: Db, tx: ActiveTx) -> Self {
        Self {
            db,
            tx: Arc::new(tx),
        }
    }

    /// A session whose statements run on this transaction.
    #[must_use]
    pub fn session(&self) -> Session {
        Session {
            db: self.db.clone(),
            lazy: None,
            bound: Some(Arc::clone(&self.tx)),
        }
    }

    /// # Errors
    /// [`DbError::TxStillShared`] if a session from [`Self::session`] is still alive,
    /// or the commit failure.
    pub async fn commit(self) -> Result<(), DbError> {
        let tx = Arc::try_unwrap(self.tx).map_err(|_| DbError::TxStillShared)?;
        tx.commit(self.db.counters()).await
    }

    /// # Errors
    /// [`DbError::TxStillShared`] if a session from [`Self::session`] is still alive,
    /// or the rollback failure.
    pub async fn rollback(self) -> Result<(), DbError> {
        let tx = Arc::try_unwrap(self.tx).map_err(|_| DbError::TxStillShared)?;
        tx.rollback(self.db.counters()).await
    }
}

#[derive(Clone, Copy)]
enum Target<'a> {
    Pool(&'a DatabaseConnection),
    Tx(&'a DatabaseTransaction),
}

/// Statement runner bound to either the pool or a transaction.
///
/// Implements [`ConnectionTrait`], so any sea-orm query accepts it.
/// Statements inside a transaction are bounded by the transaction deadline.
#[derive(Clone, Copy)]
pub struct DbRunner<'a> {
    target: Target<'a>,
    deadline: Option<Instant>,
}

impl<'a> DbRunner<'a> {
    pub(crate) fn pool(conn: &'a DatabaseConnection) -> Self {
        Self {
            target: Target::Pool(conn),
            deadline: None,
        }
    }

    pub(crate) fn transaction(tx: &'a DatabaseTransaction, deadline: Instant) -> Self {
        Self {
            target: Target::Tx(tx),
            deadline: Some(deadline),
        }
    }

    /// Whether statements run inside a transaction.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        matches!(self.target, Target::Tx(_))
    }

    async fn bounded<T, Fut>(&self, fut: Fut) -> Result<T, DbErr>
    where
        Fut: Future<Output = Result<T, DbErr>>,
    {
        match self.deadline {
            None => fut.await,
            Some(deadline) => timeout_at(deadline, fut)
                .await
                .unwrap_or_else(|_| Err(DbErr::Custom(TX_DEADLINE_EXCEEDED.to_owned()))),
        }
    }
}

#[async_trait]
impl<'a> ConnectionTrait for DbRunner<'a> {
    fn get_database_backend(&self) -> DbBackend {
        match self.target {
            Target::Pool(c) => c.get_database_backend(),
            Target::Tx(t) => t.get_database_backend(),
        }
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        match self.target {
            Target::Pool(c) => c.execute(stmt).await,
            Target::Tx(t) => self.bounded(t.execute(stmt)).await,
        }
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        match self.target {
            Target::Pool(c) => c.execute_unprepared(sql).await,
            Target::Tx(t) => self.bounded(t.execute_unprepared(sql)).await,
        }
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        match self.target {
            Target::Pool(c) => c.query_one(stmt).await,
            Target::Tx(t) => self.bounded(t.query_one(stmt)).await,
        }
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        match self.target {
            Target::Pool(c) => c.query_all(stmt).await,
            Target::Tx(t) => self.bounded(t.query_all(stmt)).await,
        }
    }

    fn support_returning(&self) -> bool {
        match self.target {
            Target::Pool(c) => c.support_returning(),
            Target::Tx(t) => t.support_returning(),
        }
    }
}
