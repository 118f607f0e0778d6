use std::sync::Arc;

use axum::extract::Path;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use tenant_db::{Db, Session};
use uuid::Uuid;

use super::caller::Caller;
use super::dto::{
    CreateTenantReq, InvitationDto, MemberReq, RegistrationReq, TenantDto, TenantListDto,
    TenantUserDto, TenantUserListDto, TokenHookReq, UpdateMemberReq, UpdateTenantReq,
};
use super::error::{ApiError, ApiResult};
use crate::ConcreteService;
use crate::domain::model::TokenClaims;

type Svc = Extension<Arc<ConcreteService>>;

fn api_err(uri: &Uri) -> impl FnOnce(crate::domain::error::DomainError) -> ApiError + '_ {
    move |e| ApiError::new(e, uri.path())
}

// ==================== Tenants ====================

#[tracing::instrument(skip(svc, session, body), fields(tenant.name = %body.name))]
pub async fn create_tenant(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Json(body): Json<CreateTenantReq>,
) -> ApiResult<impl IntoResponse> {
    let tenant = svc
        .create_tenant(&session, &body.name)
        .await
        .map_err(api_err(&uri))?;
    Ok((StatusCode::CREATED, Json(TenantDto::from(tenant))))
}

#[tracing::instrument(skip(svc, session))]
pub async fn list_tenants(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<TenantListDto>> {
    let tenants = svc.list_tenants(&session).await.map_err(api_err(&uri))?;
    Ok(Json(tenants.into()))
}

#[tracing::instrument(skip(svc, session), fields(tenant.id = %id))]
pub async fn get_tenant(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TenantDto>> {
    let tenant = svc.get_tenant(&session, id).await.map_err(api_err(&uri))?;
    Ok(Json(tenant.into()))
}

#[tracing::instrument(skip(svc, session, body), fields(tenant.id = %id))]
pub async fn update_tenant(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTenantReq>,
) -> ApiResult<Json<TenantDto>> {
    let (patch, paths) = body.into_parts();
    let tenant = svc
        .update_tenant(&session, id, patch, &paths)
        .await
        .map_err(api_err(&uri))?;
    Ok(Json(tenant.into()))
}

#[tracing::instrument(skip(svc, session), fields(tenant.id = %id))]
pub async fn delete_tenant(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    svc.delete_tenant(&session, id)
        .await
        .map_err(api_err(&uri))?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(svc, session), fields(tenant.id = %id))]
pub async fn activate_tenant(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TenantDto>> {
    let tenant = svc
        .activate_tenant(&session, id)
        .await
        .map_err(api_err(&uri))?;
    Ok(Json(tenant.into()))
}

#[tracing::instrument(skip(svc, session), fields(tenant.id = %id))]
pub async fn deactivate_tenant(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TenantDto>> {
    let tenant = svc
        .deactivate_tenant(&session, id)
        .await
        .map_err(api_err(&uri))?;
    Ok(Json(tenant.into()))
}

// ==================== Members ====================

#[tracing::instrument(skip(svc, session), fields(tenant.id = %id))]
pub async fn list_tenant_users(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TenantUserListDto>> {
    let users = svc
        .list_tenant_users(&session, id)
        .await
        .map_err(api_err(&uri))?;
    Ok(Json(TenantUserListDto {
        users: users.into_iter().map(Into::into).collect(),
    }))
}

#[tracing::instrument(skip(svc, session, body), fields(tenant.id = %id, role = %body.role))]
pub async fn invite_member(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(body): Json<MemberReq>,
) -> ApiResult<impl IntoResponse> {
    let invitation = svc
        .invite_member(&session, id, &body.email, body.role)
        .await
        .map_err(api_err(&uri))?;
    Ok((StatusCode::CREATED, Json(InvitationDto::from(invitation))))
}

#[tracing::instrument(skip(svc, session, body), fields(tenant.id = %id, role = %body.role))]
pub async fn provision_user(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
    Json(body): Json<MemberReq>,
) -> ApiResult<impl IntoResponse> {
    let user = svc
        .provision_user(&session, id, &body.email, body.role)
        .await
        .map_err(api_err(&uri))?;
    Ok((StatusCode::CREATED, Json(TenantUserDto::from(user))))
}

#[tracing::instrument(skip(svc, session, body), fields(tenant.id = %id, user.id = %user_id))]
pub async fn change_member_role(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Path((id, user_id)): Path<(Uuid, String)>,
    Json(body): Json<UpdateMemberReq>,
) -> ApiResult<Json<TenantUserDto>> {
    let user = svc
        .change_member_role(&session, id, &user_id, body.role)
        .await
        .map_err(api_err(&uri))?;
    Ok(Json(user.into()))
}

#[tracing::instrument(skip(svc, session), fields(user.id = %user_id))]
pub async fn list_user_tenants(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<TenantListDto>> {
    let tenants = svc
        .list_user_tenants(&session, &user_id)
        .await
        .map_err(api_err(&uri))?;
    Ok(Json(tenants.into()))
}

#[tracing::instrument(skip(svc, session, caller), fields(user.id = %caller.0))]
pub async fn list_my_tenants(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    caller: Caller,
) -> ApiResult<Json<TenantListDto>> {
    let tenants = svc
        .list_active_user_tenants(&session, &caller.0)
        .await
        .map_err(api_err(&uri))?;
    Ok(Json(tenants.into()))
}

// ==================== Webhooks ====================

#[tracing::instrument(skip(svc, session, body), fields(user.id = %body.user_id))]
pub async fn registration_webhook(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Json(body): Json<RegistrationReq>,
) -> ApiResult<StatusCode> {
    svc.handle_registration(&session, &body.user_id, &body.email)
        .await
        .map_err(api_err(&uri))?;
    Ok(StatusCode::OK)
}

#[tracing::instrument(skip(svc, session, body))]
pub async fn token_hook(
    uri: Uri,
    Extension(svc): Svc,
    Extension(session): Extension<Session>,
    Json(body): Json<TokenHookReq>,
) -> ApiResult<Json<TokenClaims>> {
    let claims = svc
        .token_claims(&session, body.subject())
        .await
        .map_err(api_err(&uri))?;
    Ok(Json(claims))
}

// ==================== Health ====================

pub async fn healthz(Extension(db): Extension<Db>) -> impl IntoResponse {
    match db.ping().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable" })),
            )
        }
    }
}
