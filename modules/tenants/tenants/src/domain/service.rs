//! Tenant use cases.
//!
//! Two stores are involved and they are not transactional with each other:
//!
//! - the relational store (through [`TenantsRepository`]) is authoritative for
//!   whether tenants and memberships exist and for their metadata;
//! - the tuple store (through [`Authorizer`]) is authoritative for access
//!   decisions.
//!
//! Multi-step operations write the relational row first and the tuple second.
//! A failing step aborts the remaining ones; nothing already written is undone.

use std::sync::Arc;

use tenant_authz::{Authorizer, RoleTransition};
use tenant_db::{DbError, Session};
use uuid::Uuid;

use super::error::DomainError;
use super::model::{
    Invitation, Membership, NewTenant, Role, Tenant, TenantField, TenantPatch, TenantUser,
    TokenClaims,
};
use super::ports::{Identity, IdentityDirectory};
use super::repo::TenantsRepository;
use crate::config::TenantsConfig;

/// Email reported for members whose identity cannot be resolved.
pub const UNKNOWN_EMAIL: &str = "unknown";

pub struct Service<R: TenantsRepository> {
    repo: Arc<R>,
    authz: Arc<Authorizer>,
    identities: Arc<dyn IdentityDirectory>,
    config: TenantsConfig,
}

impl<R: TenantsRepository> Service<R> {
    #[must_use]
    pub fn new(
        repo: Arc<R>,
        authz: Arc<Authorizer>,
        identities: Arc<dyn IdentityDirectory>,
        config: TenantsConfig,
    ) -> Self {
        Self {
            repo,
            authz,
            identities,
            config,
        }
    }

    // ---- tenants ----

    /// Creates an enabled tenant on behalf of an administrator.
    ///
    /// # Errors
    /// [`DomainError::Validation`] for a blank name, or the storage failure.
    #[tracing::instrument(skip(self, session))]
    pub async fn create_tenant(
        &self,
        session: &Session,
        name: &str,
    ) -> Result<Tenant, DomainError> {
        let name = validated_name(name)?;
        let tenant = self
            .repo
            .create_tenant(
                session,
                NewTenant {
                    name,
                    enabled: true,
                },
            )
            .await?;
        tracing::info!(tenant_id = %tenant.id, "tenant created");
        Ok(tenant)
    }

    /// # Errors
    /// [`DomainError::NotFound`] if the tenant does not exist.
    #[tracing::instrument(skip(self, session))]
    pub async fn get_tenant(&self, session: &Session, id: Uuid) -> Result<Tenant, DomainError> {
        // Existence is answered by the relational store.
        self.repo
            .get_tenant(session, id)
            .await?
            .ok_or_else(|| DomainError::not_found("tenant", id))
    }

    /// # Errors
    /// Storage failure.
    #[tracing::instrument(skip(self, session))]
    pub async fn list_tenants(&self, session: &Session) -> Result<Vec<Tenant>, DomainError> {
        Ok(self.repo.list_tenants(session).await?)
    }

    /// Tenants the user belongs to, disabled ones included.
    ///
    /// # Errors
    /// Storage failure.
    #[tracing::instrument(skip(self, session))]
    pub async fn list_user_tenants(
        &self,
        session: &Session,
        user_id: &str,
    ) -> Result<Vec<Tenant>, DomainError> {
        // Membership listing comes from the relational store, not from list_objects.
        Ok(self.repo.list_user_tenants(session, user_id, false).await?)
    }

    /// Enabled tenants the user belongs to.
    ///
    /// # Errors
    /// Storage failure.
    #[tracing::instrument(skip(self, session))]
    pub async fn list_active_user_tenants(
        &self,
        session: &Session,
        user_id: &str,
    ) -> Result<Vec<Tenant>, DomainError> {
        Ok(self.repo.list_user_tenants(session, user_id, true).await?)
    }

    /// Applies the fields of `patch` selected by `paths`.
    ///
    /// An empty `paths` selects every field present in `patch`. A path that
    /// names a field missing from `patch` is rejected.
    ///
    /// # Errors
    /// [`DomainError::Validation`] for unknown paths, missing values or a blank
    /// name; [`DomainError::NotFound`] if the tenant does not exist.
    #[tracing::instrument(skip(self, session, patch))]
    pub async fn update_tenant(
        &self,
        session: &Session,
        id: Uuid,
        mut patch: TenantPatch,
        paths: &[String],
    ) -> Result<Tenant, DomainError> {
        let requested = TenantField::parse_paths(paths)?;
        if !paths.is_empty() && requested.iter().any(|field| !patch.has(*field)) {
            return Err(DomainError::validation(
                "paths",
                "every listed path needs a value in the update",
            ));
        }
        let fields: Vec<TenantField> = requested
            .into_iter()
            .filter(|field| patch.has(*field))
            .collect();
        if let Some(name) = patch.name.take() {
            patch.name = Some(validated_name(&name)?);
        }

        self.repo
            .update_tenant(session, id, patch, &fields)
            .await?
            .ok_or_else(|| DomainError::not_found("tenant", id))
    }

    /// Deletes the tenant row, then removes its tuples.
    ///
    /// An absent row is not an error and the tuple cleanup still runs, so the
    /// call can be repeated to clear tuples left by an interrupted cleanup.
    /// A cleanup failure is logged and not returned.
    ///
    /// # Errors
    /// Storage failure while deleting the row.
    #[tracing::instrument(skip(self, session))]
    pub async fn delete_tenant(&self, session: &Session, id: Uuid) -> Result<(), DomainError> {
        let removed = self.repo.delete_tenant(session, id).await?;
        if !removed {
            tracing::info!(tenant_id = %id, "tenant row already absent; cleaning up tuples");
        }

        if let Err(e) = self.authz.delete_tenant(&id.to_string()).await {
            tracing::error!(
                tenant_id = %id,
                error = %e,
                "failed to remove tenant tuples; orphan tuples remain until delete is repeated"
            );
        }
        Ok(())
    }

    /// # Errors
    /// [`DomainError::NotFound`] if the tenant does not exist.
    #[tracing::instrument(skip(self, session))]
    pub async fn activate_tenant(
        &self,
        session: &Session,
        id: Uuid,
    ) -> Result<Tenant, DomainError> {
        self.set_status(session, id, true).await
    }

    /// # Errors
    /// [`DomainError::NotFound`] if the tenant does not exist.
    #[tracing::instrument(skip(self, session))]
    pub async fn deactivate_tenant(
        &self,
        session: &Session,
        id: Uuid,
    ) -> Result<Tenant, DomainError> {
        self.set_status(session, id, false).await
    }

    async fn set_status(
        &self,
        session: &Session,
        id: Uuid,
        enabled: bool,
    ) -> Result<Tenant, DomainError> {
        self.repo
            .set_tenant_status(session, id, enabled)
            .await?
            .ok_or_else(|| DomainError::not_found("tenant", id))
    }

    // ---- members ----

    /// Members of the tenant with their email.
    ///
    /// A member whose identity cannot be fetched is listed with the email
    /// [`UNKNOWN_EMAIL`].
    ///
    /// # Errors
    /// [`DomainError::NotFound`] if the tenant does not exist, or the storage failure.
    #[tracing::instrument(skip(self, session))]
    pub async fn list_tenant_users(
        &self,
        session: &Session,
        tenant_id: Uuid,
    ) -> Result<Vec<TenantUser>, DomainError> {
        self.get_tenant(session, tenant_id).await?;
        let members = self.repo.list_members(session, tenant_id).await?;

        let mut users = Vec::with_capacity(members.len());
        for member in members {
            let email = match self.identities.get(&member.kratos_identity_id).await {
                Ok(identity) => identity.email,
                Err(e) => {
                    tracing::warn!(
                        user_id = %member.kratos_identity_id,
                        error = %e,
                        "failed to resolve member identity"
                    );
                    UNKNOWN_EMAIL.to_owned()
                }
            };
            users.push(TenantUser {
                user_id: member.kratos_identity_id,
                email,
                role: member.role,
            });
        }
        Ok(users)
    }

    /// Adds the user behind `email` to the tenant and issues a recovery link.
    ///
    /// An existing membership is not an error: the grant is re-applied and a
    /// fresh link is issued, which makes the call usable as a re-invite.
    ///
    /// # Errors
    /// [`DomainError::NotFound`] if the tenant does not exist, or the first failing
    /// dependency.
    #[tracing::instrument(skip(self, session))]
    pub async fn invite_member(
        &self,
        session: &Session,
        tenant_id: Uuid,
        email: &str,
        role: Role,
    ) -> Result<Invitation, DomainError> {
        let identity = self.resolve_identity(email).await?;

        self.join_tenant(session, tenant_id, &identity.id, role)
            .await?;

        let link = self
            .identities
            .issue_recovery_link(&identity.id, self.config.invitation_lifetime)
            .await?;

        Ok(Invitation {
            user_id: identity.id,
            link: link.link,
            code: link.code,
        })
    }

    /// Adds the user behind `email` to the tenant without issuing a link.
    ///
    /// Repeating the call for an existing member re-applies the grant, so a
    /// retry restores a tuple lost to an earlier failed grant.
    ///
    /// # Errors
    /// [`DomainError::NotFound`] if the tenant does not exist, or the first failing
    /// dependency.
    #[tracing::instrument(skip(self, session))]
    pub async fn provision_user(
        &self,
        session: &Session,
        tenant_id: Uuid,
        email: &str,
        role: Role,
    ) -> Result<TenantUser, DomainError> {
        let identity = self.resolve_identity(email).await?;
        self.join_tenant(session, tenant_id, &identity.id, role)
            .await?;

        Ok(TenantUser {
            user_id: identity.id,
            email: identity.email,
            role,
        })
    }

    /// Changes a member's role.
    ///
    /// The new relation is granted before the old one is removed, then the
    /// row is updated.
    ///
    /// # Errors
    /// [`DomainError::NotFound`] for an unknown membership, the grant failure,
    /// or the storage failure.
    #[tracing::instrument(skip(self, session))]
    pub async fn change_member_role(
        &self,
        session: &Session,
        tenant_id: Uuid,
        user_id: &str,
        role: Role,
    ) -> Result<TenantUser, DomainError> {
        let current = self
            .repo
            .get_membership(session, tenant_id, user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("membership", format!("{tenant_id}/{user_id}")))?;

        let membership = if current.role == role {
            current
        } else {
            let outcome = self
                .authz
                .transition_relation(
                    &tenant_id.to_string(),
                    user_id,
                    current.role.relation(),
                    role.relation(),
                )
                .await?;
            if outcome == RoleTransition::StaleRelationKept {
                tracing::warn!(
                    user_id,
                    from = %current.role,
                    to = %role,
                    "previous relation left in place"
                );
            }
            self.repo
                .update_member_role(session, tenant_id, user_id, role)
                .await?
        };

        let email = match self.identities.get(user_id).await {
            Ok(identity) => identity.email,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "failed to resolve member identity");
                UNKNOWN_EMAIL.to_owned()
            }
        };

        Ok(TenantUser {
            user_id: membership.kratos_identity_id,
            email,
            role: membership.role,
        })
    }

    // ---- webhooks ----

    /// Provisions a personal, disabled tenant for a freshly registered identity.
    ///
    /// # Errors
    /// [`DomainError::Validation`] for a missing identity id or email, or the
    /// first failing dependency.
    #[tracing::instrument(skip(self, session))]
    pub async fn handle_registration(
        &self,
        session: &Session,
        identity_id: &str,
        email: &str,
    ) -> Result<Tenant, DomainError> {
        if identity_id.trim().is_empty() {
            return Err(DomainError::validation("user_id", "identity id is empty"));
        }
        if email.trim().is_empty() {
            return Err(DomainError::validation("email", "email is empty"));
        }

        let tenant = self
            .repo
            .create_tenant(
                session,
                NewTenant {
                    name: format!("{email}'s Org"),
                    enabled: false,
                },
            )
            .await?;

        self.add_member(session, tenant.id, identity_id, Role::Owner)
            .await?;
        self.authz
            .assign_tenant_owner(&tenant.id.to_string(), identity_id)
            .await?;

        tracing::info!(
            tenant_id = %tenant.id,
            user_id = identity_id,
            "provisioned tenant for new identity"
        );
        Ok(tenant)
    }

    /// Claims listing the user's enabled tenants.
    ///
    /// # Errors
    /// [`DomainError::Validation`] for a missing subject, or the storage failure.
    #[tracing::instrument(skip(self, session))]
    pub async fn token_claims(
        &self,
        session: &Session,
        user_id: &str,
    ) -> Result<TokenClaims, DomainError> {
        if user_id.trim().is_empty() {
            return Err(DomainError::validation(
                "subject",
                "could not identify user from request",
            ));
        }
        let tenants = self.repo.list_user_tenants(session, user_id, true).await?;
        Ok(TokenClaims::for_tenants(
            tenants.into_iter().map(|t| t.id).collect(),
        ))
    }

    // ---- helpers ----

    async fn resolve_identity(&self, email: &str) -> Result<Identity, DomainError> {
        if email.trim().is_empty() {
            return Err(DomainError::validation("email", "email is empty"));
        }
        if let Some(identity) = self.identities.find_by_email(email).await? {
            return Ok(identity);
        }
        tracing::info!(email, "creating identity");
        Ok(self.identities.create(email).await?)
    }

    /// Membership row then grant; an existing membership only gets the grant.
    async fn join_tenant(
        &self,
        session: &Session,
        tenant_id: Uuid,
        user_id: &str,
        role: Role,
    ) -> Result<(), DomainError> {
        // A failed insert aborts an open Postgres transaction. The duplicate
        // key only covers a concurrent insert.
        let existing = self.repo.get_membership(session, tenant_id, user_id).await?;
        let already_member = match existing {
            Some(_) => true,
            None => match self.add_member(session, tenant_id, user_id, role).await {
                Ok(_) => false,
                Err(DomainError::AlreadyMember { .. }) => true,
                Err(e) => return Err(e),
            },
        };
        if already_member {
            tracing::info!(user_id, "user is already a member; re-applying grant");
        }

        self.authz
            .assign_relation(&tenant_id.to_string(), user_id, role.relation())
            .await?;
        Ok(())
    }

    async fn add_member(
        &self,
        session: &Session,
        tenant_id: Uuid,
        user_id: &str,
        role: Role,
    ) -> Result<Membership, DomainError> {
        match self.repo.add_member(session, tenant_id, user_id, role).await {
            Ok(membership) => Ok(membership),
            Err(DbError::DuplicateKey(_)) => {
                Err(DomainError::already_member(tenant_id, user_id))
            }
            Err(DbError::ForeignKeyViolation(_)) => {
                Err(DomainError::not_found("tenant", tenant_id))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn validated_name(name: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("name", "name must not be empty"));
    }
    Ok(trimmed.to_owned())
}
