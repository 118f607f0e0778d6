use async_trait::async_trait;
use tenant_db::{DbError, Session};
use uuid::Uuid;

use super::model::{Membership, NewTenant, Role, Tenant, TenantField, TenantPatch};

/// Relational store of tenants and memberships.
///
/// Every call takes the request [`Session`]. Writes go through
/// [`Session::runner`], which may open the request transaction; reads go
/// through [`Session::reader`], which never does.
///
/// Errors are returned as classified [`DbError`]s so callers can tell
/// duplicate keys and missing parents apart from outages.
#[async_trait]
pub trait TenantsRepository: Send + Sync {
    async fn create_tenant(&self, session: &Session, tenant: NewTenant) -> Result<Tenant, DbError>;

    async fn get_tenant(&self, session: &Session, id: Uuid) -> Result<Option<Tenant>, DbError>;

    async fn list_tenants(&self, session: &Session) -> Result<Vec<Tenant>, DbError>;

    /// Tenants `user_id` is a member of. With `active_only`, disabled tenants are skipped.
    async fn list_user_tenants(
        &self,
        session: &Session,
        user_id: &str,
        active_only: bool,
    ) -> Result<Vec<Tenant>, DbError>;

    /// Applies `patch` to the given `fields`. Returns `None` when the tenant does not exist.
    async fn update_tenant(
        &self,
        session: &Session,
        id: Uuid,
        patch: TenantPatch,
        fields: &[TenantField],
    ) -> Result<Option<Tenant>, DbError>;

    /// Deletes the tenant and, through the foreign key, its memberships.
    /// Returns whether a row was removed.
    async fn delete_tenant(&self, session: &Session, id: Uuid) -> Result<bool, DbError>;

    /// Returns `None` when the tenant does not exist.
    async fn set_tenant_status(
        &self,
        session: &Session,
        id: Uuid,
        enabled: bool,
    ) -> Result<Option<Tenant>, DbError>;

    /// Inserts a membership.
    ///
    /// [`DbError::DuplicateKey`] if the user is already a member,
    /// [`DbError::ForeignKeyViolation`] if the tenant does not exist.
    async fn add_member(
        &self,
        session: &Session,
        tenant_id: Uuid,
        user_id: &str,
        role: Role,
    ) -> Result<Membership, DbError>;

    async fn get_membership(
        &self,
        session: &Session,
        tenant_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Membership>, DbError>;

    /// [`DbError::NotFound`] if there is no such membership.
    async fn update_member_role(
        &self,
        session: &Session,
        tenant_id: Uuid,
        user_id: &str,
        role: Role,
    ) -> Result<Membership, DbError>;

    async fn list_members(
        &self,
        session: &Session,
        tenant_id: Uuid,
    ) -> Result<Vec<Membership>, DbError>;
}
