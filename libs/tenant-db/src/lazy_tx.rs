//! Request-scoped transaction that is opened on first write.
//!
//! A [`LazyTx`] begins at most once. Until something asks for a writable runner
//! no `BEGIN` is sent, so read-only work never pays for a transaction. Once
//! begun, the transaction is guarded by its own deadline instead of the
//! caller's cancellation, and commit/rollback run on a detached task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend,
    IsolationLevel, TransactionTrait,
};
use tokio::sync::OnceCell;
use tokio::time::{Instant, timeout_at};

use crate::error::DbError;
use crate::session::DbRunner;

/// Final state of a lazy transaction after its scope ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Nothing touched the database, so nothing was opened or finished.
    NotStarted,
    Committed,
    RolledBack,
}

/// Snapshot of transaction counters for a [`crate::Db`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
}

#[derive(Debug, Default)]
pub(crate) struct TxCounters {
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl TxCounters {
    pub(crate) fn snapshot(&self) -> TxStats {
        TxStats {
            begun: self.begun.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
        }
    }
}

/// An open transaction plus the deadline that bounds it.
pub(crate) struct ActiveTx {
    tx: DatabaseTransaction,
    deadline: Instant,
}

impl ActiveTx {
    /// Begins a read-committed, read-write transaction.
    ///
    /// `SQLite` has no per-transaction isolation, so it gets a plain `BEGIN`.
    pub(crate) async fn begin(
        conn: &DatabaseConnection,
        timeout: Duration,
        counters: &TxCounters,
    ) -> Result<Self, DbError> {
        let tx = match conn.get_database_backend() {
            DbBackend::Sqlite => conn.begin().await?,
            _ => {
                conn.begin_with_config(
                    Some(IsolationLevel::ReadCommitted),
                    Some(AccessMode::ReadWrite),
                )
                .await?
            }
        };
        counters.begun.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(timeout_ms = timeout.as_millis(), "transaction started");
        Ok(Self {
            tx,
            deadline: Instant::now() + timeout,
        })
    }

    pub(crate) fn runner(&self) -> DbRunner<'_> {
        DbRunner::transaction(&self.tx, self.deadline)
    }

    pub(crate) async fn commit(self, counters: &TxCounters) -> Result<(), DbError> {
        if Instant::now() >= self.deadline {
            self.rollback(counters).await?;
            return Err(DbError::TxTimeout);
        }
        match timeout_at(self.deadline, self.tx.commit()).await {
            Ok(Ok(())) => {
                counters.committed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(DbError::TxTimeout),
        }
    }

    pub(crate) async fn rollback(self, counters: &TxCounters) -> Result<(), DbError> {
        self.tx.rollback().await?;
        counters.rolled_back.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// At-most-once transaction holder scoped to a single unit of work.
pub(crate) struct LazyTx {
    db: crate::Db,
    cell: OnceCell<ActiveTx>,
}

impl LazyTx {
    pub(crate) fn new(db: crate::Db) -> Self {
        Self {
            db,
            cell: OnceCell::new(),
        }
    }

    /// The open transaction, if something already started it.
    pub(crate) fn active(&self) -> Option<&ActiveTx> {
        self.cell.get()
    }

    pub(crate) fn is_started(&self) -> bool {
        self.cell.initialized()
    }

    /// Returns the open transaction, beginning it on first call.
    ///
    /// A failed `BEGIN` is returned to the caller and not retried here.
    pub(crate) async fn get_or_begin(&self) -> Result<&ActiveTx, DbError> {
        self.cell
            .get_or_try_init(|| {
                ActiveTx::begin(self.db.conn(), self.db.tx_timeout(), self.db.counters())
            })
            .await
    }

    /// Commits if started. Runs detached so a dropped caller cannot interrupt it.
    pub(crate) async fn commit(self) -> Result<TxOutcome, DbError> {
        self.finish(true).await
    }

    /// Rolls back if started. Runs detached so a dropped caller cannot interrupt it.
    pub(crate) async fn rollback(self) -> Result<TxOutcome, DbError> {
        self.finish(false).await
    }

    async fn finish(self, commit: bool) -> Result<TxOutcome, DbError> {
        let Self { db, cell } = self;
        let Some(active) = cell.into_inner() else {
            return Ok(TxOutcome::NotStarted);
        };

        let handle = tokio::spawn(async move {
            if commit {
                active
                    .commit(db.counters())
                    .await
                    .map(|()| TxOutcome::Committed)
            } else {
                active
                    .rollback(db.counters())
                    .await
                    .map(|()| TxOutcome::RolledBack)
            }
        });

        handle.await.map_err(|e| DbError::Task(e.to_string()))?
    }
}
