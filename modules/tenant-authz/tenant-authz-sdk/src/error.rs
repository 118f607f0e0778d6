//! Error types for the authorization store.

use thiserror::Error;

/// Errors returned by a [`crate::TupleStore`] or the authorizer built on it.
///
/// A denied check is `Ok(false)`, never an error.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The store could not be reached or the request did not complete.
    #[error("authorization store transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success status.
    #[error("authorization store returned {status}: {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The store answered with a body that could not be decoded.
    #[error("failed to decode authorization store response: {0}")]
    Decode(String),

    /// The model loaded in the store differs from the one this service expects.
    #[error("invalid authorization model: {0}")]
    InvalidAuthorizationModel(String),

    /// Client-side configuration problem.
    #[error("invalid authorization configuration: {0}")]
    Config(String),
}

impl AuthzError {
    #[must_use]
    pub fn api(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}
