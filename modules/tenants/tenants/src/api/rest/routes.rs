use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, Request};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use axum::{Extension, Router};
use tenant_db::Db;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::field::Empty;

use super::handlers;
use crate::ConcreteService;
use crate::api::middleware::transaction_middleware;

pub const API_PREFIX: &str = "/api/v0";

const REQUEST_ID_HEADER: &str = "x-request-id";

fn api_routes() -> Router {
    Router::new()
        .route(
            "/tenants",
            post(handlers::create_tenant).get(handlers::list_tenants),
        )
        .route(
            "/tenants/{id}",
            get(handlers::get_tenant)
                .patch(handlers::update_tenant)
                .delete(handlers::delete_tenant),
        )
        .route("/tenants/{id}/activate", post(handlers::activate_tenant))
        .route("/tenants/{id}/deactivate", post(handlers::deactivate_tenant))
        .route(
            "/tenants/{id}/users",
            get(handlers::list_tenant_users).post(handlers::provision_user),
        )
        .route("/tenants/{id}/invitations", post(handlers::invite_member))
        .route(
            "/tenants/{id}/users/{user_id}",
            patch(handlers::change_member_role),
        )
        .route("/users/{user_id}/tenants", get(handlers::list_user_tenants))
        .route("/me/tenants", get(handlers::list_my_tenants))
        .route(
            "/webhooks/registration",
            post(handlers::registration_webhook),
        )
        .route("/webhooks/token", post(handlers::token_hook))
}

/// Builds the HTTP surface of the service.
///
/// Layers, outermost first: request id, tracing, transaction boundary, handlers.
#[must_use]
pub fn router(db: Db, service: Arc<ConcreteService>) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .nest(API_PREFIX, api_routes())
        .route("/healthz", get(handlers::healthz))
        .layer(Extension(service))
        .layer(Extension(db.clone()))
        .layer(from_fn_with_state(db, transaction_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<axum::body::Body>| {
                    let rid = req
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("n/a");
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri().path(),
                        request_id = %rid,
                        status = Empty,
                        latency_ms = Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<axum::body::Body>,
                     latency: Duration,
                     span: &tracing::Span| {
                        span.record("status", res.status().as_u16());
                        span.record("latency_ms", latency.as_millis());
                    },
                ),
        )
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}
