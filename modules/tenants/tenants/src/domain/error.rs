use tenant_authz_sdk::AuthzError;
use tenant_db::DbError;
use thiserror::Error;

use super::ports::IdentityError;

/// Errors surfaced by the tenant service. Callers branch on these only.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("user {user_id} is already a member of tenant {tenant_id}")]
    AlreadyMember { tenant_id: String, user_id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("authorization store failure: {0}")]
    Authorization(#[source] AuthzError),

    #[error("identity directory failure: {0}")]
    Identity(#[source] IdentityError),

    #[error("database error: {0}")]
    Database(#[source] DbError),
}

impl DomainError {
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn already_member(tenant_id: impl ToString, user_id: impl Into<String>) -> Self {
        Self::AlreadyMember {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<DbError> for DomainError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(what) => Self::NotFound {
                entity: "record",
                id: what,
            },
            DbError::DuplicateKey(msg) => Self::Conflict(msg),
            DbError::ForeignKeyViolation(msg) => {
                tracing::debug!(error = %msg, "referenced row does not exist");
                Self::NotFound {
                    entity: "tenant",
                    id: msg,
                }
            }
            other => {
                tracing::error!(error = %other, "database operation failed");
                Self::Database(other)
            }
        }
    }
}

impl From<AuthzError> for DomainError {
    fn from(e: AuthzError) -> Self {
        tracing::error!(error = %e, "authorization store operation failed");
        Self::Authorization(e)
    }
}

impl From<IdentityError> for DomainError {
    fn from(e: IdentityError) -> Self {
        tracing::error!(error = %e, "identity directory operation failed");
        Self::Identity(e)
    }
}
