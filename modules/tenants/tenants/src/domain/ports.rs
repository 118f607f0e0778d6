//! Outbound ports of the domain layer.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Identity as known to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

/// One-time link and code for account recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryLink {
    pub link: String,
    pub code: String,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("identity not found: {0}")]
    NotFound(String),

    #[error("identity provider transport error: {0}")]
    Transport(String),

    #[error("identity provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode identity provider response: {0}")]
    Decode(String),

    #[error("invalid identity provider configuration: {0}")]
    Config(String),
}

/// Directory of user identities (Kratos admin API in production).
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Looks up the identity whose credentials identifier is `email`.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, IdentityError>;

    /// Creates an identity with `email` as its only trait.
    async fn create(&self, email: &str) -> Result<Identity, IdentityError>;

    async fn get(&self, id: &str) -> Result<Identity, IdentityError>;

    /// Issues a recovery link valid for `ttl`.
    async fn issue_recovery_link(
        &self,
        id: &str,
        ttl: Duration,
    ) -> Result<RecoveryLink, IdentityError>;
}
