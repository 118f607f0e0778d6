//! Identity of the caller as asserted by the authenticating proxy.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;

use super::error::Problem;

/// Header set by the proxy in front of the service after Kratos authenticated the request.
pub const IDENTITY_HEADER: &str = "x-kratos-authenticated-identity-id";

/// Kratos identity id of the caller.
///
/// Rejects with a 401 problem when the header is absent, empty or not text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Problem;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| Self(id.to_owned()))
            .ok_or_else(|| {
                Problem::new(
                    StatusCode::UNAUTHORIZED,
                    "Unauthorized",
                    "request carries no authenticated identity",
                )
                .with_instance(parts.uri.path())
            })
    }
}
