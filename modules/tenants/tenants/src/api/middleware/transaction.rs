//! Request-scoped transaction boundary.
//!
//! Every request gets a [`Session`] in its extensions:
//!
//! - `GET` and `HEAD` get a pooled session and never open a transaction;
//! - other methods run inside [`Db::with_transaction`]. The transaction opens
//!   on the handler's first write. It is committed when the response status is
//!   below 400 and rolled back otherwise; the handler's response is returned
//!   either way. A failed commit turns the response into a 500 problem.

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tenant_db::{Db, DbError, Session};

use crate::api::rest::error::Problem;

/// Why a transaction scope did not commit.
enum ScopeExit {
    /// The handler answered with an error status.
    Failed(Response),
    Db(DbError),
}

impl From<DbError> for ScopeExit {
    fn from(e: DbError) -> Self {
        Self::Db(e)
    }
}

fn is_read_only(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD)
}

pub async fn transaction_middleware(
    State(db): State<Db>,
    mut req: Request,
    next: Next,
) -> Response {
    if is_read_only(req.method()) {
        req.extensions_mut().insert(db.session());
        return next.run(req).await;
    }

    let outcome = db
        .with_transaction(|session: Session| async move {
            req.extensions_mut().insert(session);
            let response = next.run(req).await;
            if response.status().as_u16() >= 400 {
                Err(ScopeExit::Failed(response))
            } else {
                Ok(response)
            }
        })
        .await;

    match outcome {
        Ok(response) | Err(ScopeExit::Failed(response)) => response,
        Err(ScopeExit::Db(e)) => {
            tracing::error!(error = %e, "request transaction failed to complete");
            Problem::internal("Failed to complete the request transaction").into_response()
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn only_get_and_head_skip_the_transaction() {
        assert!(is_read_only(&Method::GET));
        assert!(is_read_only(&Method::HEAD));
        for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            assert!(!is_read_only(&method), "{method}");
        }
    }
}
