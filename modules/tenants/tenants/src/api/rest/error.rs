use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// RFC 9457 problem details body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance: String,
}

impl Problem {
    #[must_use]
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_owned(),
            title: title.into(),
            status: status.as_u16(),
            detail: detail.into(),
            instance: String::new(),
        }
    }

    #[must_use]
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            detail,
        )
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut resp = (status, Json(self)).into_response();
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        resp
    }
}

/// Maps a domain error to a problem response.
#[must_use]
pub fn domain_error_to_problem(e: &DomainError, instance: &str) -> Problem {
    let problem = match e {
        DomainError::NotFound { .. } => {
            Problem::new(StatusCode::NOT_FOUND, "Not Found", e.to_string())
        }
        DomainError::AlreadyMember { .. } | DomainError::Conflict(_) => {
            Problem::new(StatusCode::CONFLICT, "Conflict", e.to_string())
        }
        DomainError::Validation { .. } => {
            Problem::new(StatusCode::BAD_REQUEST, "Bad Request", e.to_string())
        }
        DomainError::Authorization(_) | DomainError::Identity(_) => {
            tracing::error!(error = %e, "upstream dependency failed");
            Problem::new(
                StatusCode::BAD_GATEWAY,
                "Bad Gateway",
                "An upstream dependency failed",
            )
        }
        DomainError::Database(_) => {
            // Details stay in the logs.
            tracing::error!(error = %e, "database error occurred");
            Problem::internal("An internal database error occurred")
        }
    };
    problem.with_instance(instance)
}

/// Domain error carried to the response together with the request path.
#[derive(Debug)]
pub struct ApiError {
    error: DomainError,
    instance: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: DomainError, instance: impl Into<String>) -> Self {
        Self {
            error,
            instance: instance.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        domain_error_to_problem(&self.error, &self.instance).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
