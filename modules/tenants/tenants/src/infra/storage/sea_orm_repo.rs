use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use tenant_db::{DbError, Session};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::model::{Membership, NewTenant, Role, Tenant, TenantField, TenantPatch};
use crate::domain::repo::TenantsRepository;

use super::entity::membership::{self, StoredRole};
use super::entity::tenant;

/// sea-orm implementation of [`TenantsRepository`].
#[derive(Debug, Clone, Default)]
pub struct SeaOrmTenantsRepository;

impl SeaOrmTenantsRepository {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn membership_filter(tenant_id: Uuid, user_id: &str) -> sea_orm::Condition {
    sea_orm::Condition::all()
        .add(membership::Column::TenantId.eq(tenant_id))
        .add(membership::Column::KratosIdentityId.eq(user_id))
}

#[async_trait]
impl TenantsRepository for SeaOrmTenantsRepository {
    async fn create_tenant(&self, session: &Session, tenant: NewTenant) -> Result<Tenant, DbError> {
        let runner = session.runner().await?;
        let created = tenant::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(tenant.name),
            created_at: Set(OffsetDateTime::now_utc()),
            enabled: Set(tenant.enabled),
        }
        .insert(&runner)
        .await?;
        Ok(created.into())
    }

    async fn get_tenant(&self, session: &Session, id: Uuid) -> Result<Option<Tenant>, DbError> {
        let found = tenant::Entity::find_by_id(id)
            .one(&session.reader())
            .await?;
        Ok(found.map(Into::into))
    }

    async fn list_tenants(&self, session: &Session) -> Result<Vec<Tenant>, DbError> {
        let rows = tenant::Entity::find()
            .order_by_asc(tenant::Column::CreatedAt)
            .order_by_asc(tenant::Column::Id)
            .all(&session.reader())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_user_tenants(
        &self,
        session: &Session,
        user_id: &str,
        active_only: bool,
    ) -> Result<Vec<Tenant>, DbError> {
        let mut query = tenant::Entity::find()
            .inner_join(membership::Entity)
            .filter(membership::Column::KratosIdentityId.eq(user_id));
        if active_only {
            query = query.filter(tenant::Column::Enabled.eq(true));
        }
        let rows = query
            .order_by_asc(tenant::Column::CreatedAt)
            .order_by_asc(tenant::Column::Id)
            .all(&session.reader())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_tenant(
        &self,
        session: &Session,
        id: Uuid,
        patch: TenantPatch,
        fields: &[TenantField],
    ) -> Result<Option<Tenant>, DbError> {
        let runner = session.runner().await?;
        let Some(current) = tenant::Entity::find_by_id(id).one(&runner).await? else {
            return Ok(None);
        };
        if fields.is_empty() {
            return Ok(Some(current.into()));
        }

        let mut active = current.into_active_model();
        for field in fields {
            match field {
                TenantField::Name => {
                    if let Some(name) = &patch.name {
                        active.name = Set(name.clone());
                    }
                }
                TenantField::Enabled => {
                    if let Some(enabled) = patch.enabled {
                        active.enabled = Set(enabled);
                    }
                }
            }
        }
        let updated = active.update(&runner).await?;
        Ok(Some(updated.into()))
    }

    async fn delete_tenant(&self, session: &Session, id: Uuid) -> Result<bool, DbError> {
        let runner = session.runner().await?;
        let res = tenant::Entity::delete_by_id(id).exec(&runner).await?;
        Ok(res.rows_affected > 0)
    }

    async fn set_tenant_status(
        &self,
        session: &Session,
        id: Uuid,
        enabled: bool,
    ) -> Result<Option<Tenant>, DbError> {
        let runner = session.runner().await?;
        let res = tenant::Entity::update_many()
            .col_expr(tenant::Column::Enabled, Expr::value(enabled))
            .filter(tenant::Column::Id.eq(id))
            .exec(&runner)
            .await?;
        if res.rows_affected == 0 {
            return Ok(None);
        }
        let found = tenant::Entity::find_by_id(id).one(&runner).await?;
        Ok(found.map(Into::into))
    }

    async fn add_member(
        &self,
        session: &Session,
        tenant_id: Uuid,
        user_id: &str,
        role: Role,
    ) -> Result<Membership, DbError> {
        let runner = session.runner().await?;
        let created = membership::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(tenant_id),
            kratos_identity_id: Set(user_id.to_owned()),
            role: Set(StoredRole::from(role)),
            created_at: Set(OffsetDateTime::now_utc()),
        }
        .insert(&runner)
        .await?;
        Ok(created.into())
    }

    async fn get_membership(
        &self,
        session: &Session,
        tenant_id: Uuid,
        user_id: &str,
    ) -> Result<Option<Membership>, DbError> {
        let found = membership::Entity::find()
            .filter(membership_filter(tenant_id, user_id))
            .one(&session.reader())
            .await?;
        Ok(found.map(Into::into))
    }

    async fn update_member_role(
        &self,
        session: &Session,
        tenant_id: Uuid,
        user_id: &str,
        role: Role,
    ) -> Result<Membership, DbError> {
        let runner = session.runner().await?;
        let res = membership::Entity::update_many()
            .col_expr(membership::Column::Role, Expr::value(StoredRole::from(role)))
            .filter(membership_filter(tenant_id, user_id))
            .exec(&runner)
            .await?;
        if res.rows_affected == 0 {
            return Err(DbError::NotFound(format!(
                "membership {tenant_id}/{user_id}"
            )));
        }
        membership::Entity::find()
            .filter(membership_filter(tenant_id, user_id))
            .one(&runner)
            .await?
            .map(Into::into)
            .ok_or_else(|| DbError::NotFound(format!("membership {tenant_id}/{user_id}")))
    }

    async fn list_members(
        &self,
        session: &Session,
        tenant_id: Uuid,
    ) -> Result<Vec<Membership>, DbError> {
        let rows = membership::Entity::find()
            .filter(membership::Column::TenantId.eq(tenant_id))
            .order_by_asc(membership::Column::CreatedAt)
            .order_by_asc(membership::Column::Id)
            .all(&session.reader())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::test_support::inmem_db;

    #[tokio::test]
    async fn duplicate_membership_is_a_duplicate_key() {
        let db = inmem_db().await;
        let repo = SeaOrmTenantsRepository::new();
        let session = db.session();
        let tenant = repo
            .create_tenant(
                &session,
                NewTenant {
                    name: "acme".to_owned(),
                    enabled: true,
                },
            )
            .await
            .unwrap();

        repo.add_member(&session, tenant.id, "u1", Role::Member)
            .await
            .unwrap();
        let err = repo
            .add_member(&session, tenant.id, "u1", Role::Member)
            .await
            .unwrap_err();

        assert!(err.is_duplicate_key(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn membership_of_unknown_tenant_is_a_foreign_key_violation() {
        let db = inmem_db().await;
        let repo = SeaOrmTenantsRepository::new();

        let err = repo
            .add_member(&db.session(), Uuid::now_v7(), "u1", Role::Owner)
            .await
            .unwrap_err();

        assert!(
            matches!(err, DbError::ForeignKeyViolation(_)),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn deleting_a_tenant_removes_its_memberships() {
        let db = inmem_db().await;
        let repo = SeaOrmTenantsRepository::new();
        let session = db.session();
        let tenant = repo
            .create_tenant(
                &session,
                NewTenant {
                    name: "acme".to_owned(),
                    enabled: true,
                },
            )
            .await
            .unwrap();
        repo.add_member(&session, tenant.id, "u1", Role::Owner)
            .await
            .unwrap();

        assert!(repo.delete_tenant(&session, tenant.id).await.unwrap());
        assert!(!repo.delete_tenant(&session, tenant.id).await.unwrap());
        assert!(
            repo.list_members(&session, tenant.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn user_tenants_can_skip_disabled_ones() {
        let db = inmem_db().await;
        let repo = SeaOrmTenantsRepository::new();
        let session = db.session();
        let mut ids = Vec::new();
        for (name, enabled) in [("on", true), ("off", false)] {
            let tenant = repo
                .create_tenant(
                    &session,
                    NewTenant {
                        name: name.to_owned(),
                        enabled,
                    },
                )
                .await
                .unwrap();
            repo.add_member(&session, tenant.id, "u1", Role::Member)
                .await
                .unwrap();
            ids.push(tenant.id);
        }

        let all = repo.list_user_tenants(&session, "u1", false).await.unwrap();
        let active = repo.list_user_tenants(&session, "u1", true).await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(active.iter().map(|t| t.id).collect::<Vec<_>>(), vec![ids[0]]);
        assert!(
            repo.list_user_tenants(&session, "u2", false)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn update_applies_selected_fields_only() {
        let db = inmem_db().await;
        let repo = SeaOrmTenantsRepository::new();
        let session = db.session();
        let tenant = repo
            .create_tenant(
                &session,
                NewTenant {
                    name: "before".to_owned(),
                    enabled: false,
                },
            )
            .await
            .unwrap();

        let updated = repo
            .update_tenant(
                &session,
                tenant.id,
                TenantPatch {
                    name: Some("after".to_owned()),
                    enabled: Some(true),
                },
                &[TenantField::Name],
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "after");
        assert!(!updated.enabled);
        assert!(
            repo.update_tenant(&session, Uuid::now_v7(), TenantPatch::default(), &[])
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn role_update_of_missing_membership_is_not_found() {
        let db = inmem_db().await;
        let repo = SeaOrmTenantsRepository::new();

        let err = repo
            .update_member_role(&db.session(), Uuid::now_v7(), "u1", Role::Owner)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }
}
