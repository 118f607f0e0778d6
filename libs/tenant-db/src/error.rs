use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Message carried by [`DbErr::Custom`] when a statement runs past the transaction deadline.
pub(crate) const TX_DEADLINE_EXCEEDED: &str = "transaction deadline exceeded";

/// Storage error, classified once from the driver error.
///
/// Callers branch on these variants and never inspect raw driver errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("{TX_DEADLINE_EXCEEDED}")]
    TxTimeout,

    #[error("transaction is still referenced by a live session")]
    TxStillShared,

    #[error("transaction task failed: {0}")]
    Task(String),

    #[error("database error: {0}")]
    Database(DbErr),
}

impl DbError {
    #[must_use]
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<DbErr> for DbError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => return Self::DuplicateKey(msg),
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                return Self::ForeignKeyViolation(msg);
            }
            _ => {}
        }
        match err {
            DbErr::RecordNotFound(msg) => Self::NotFound(msg),
            DbErr::Custom(msg) if msg == TX_DEADLINE_EXCEEDED => Self::TxTimeout,
            other => Self::Database(other),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn record_not_found_maps_to_not_found() {
        let err = DbError::from(DbErr::RecordNotFound("tenant".to_owned()));
        assert!(err.is_not_found());
    }

    #[test]
    fn deadline_marker_maps_to_timeout() {
        let err = DbError::from(DbErr::Custom(TX_DEADLINE_EXCEEDED.to_owned()));
        assert!(matches!(err, DbError::TxTimeout));
    }

    #[test]
    fn other_errors_stay_wrapped() {
        let err = DbError::from(DbErr::Custom("boom".to_owned()));
        assert!(matches!(err, DbError::Database(_)));
        assert!(!err.is_duplicate_key());
    }
}
