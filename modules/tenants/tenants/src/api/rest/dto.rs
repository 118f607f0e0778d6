use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::model::{Invitation, Role, Tenant, TenantPatch, TenantUser};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDto {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub enabled: bool,
}

impl From<Tenant> for TenantDto {
    fn from(t: Tenant) -> Self {
        Self {
            id: t.id,
            name: t.name,
            created_at: t.created_at,
            enabled: t.enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantListDto {
    pub tenants: Vec<TenantDto>,
}

impl From<Vec<Tenant>> for TenantListDto {
    fn from(tenants: Vec<Tenant>) -> Self {
        Self {
            tenants: tenants.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTenantReq {
    pub name: String,
}

/// Partial update. `paths` names the fields to apply; empty applies every field present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTenantReq {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub paths: Vec<String>,
}

impl UpdateTenantReq {
    #[must_use]
    pub fn into_parts(self) -> (TenantPatch, Vec<String>) {
        (
            TenantPatch {
                name: self.name,
                enabled: self.enabled,
            },
            self.paths,
        )
    }
}

fn default_role() -> Role {
    Role::Member
}

/// Body of invite and provision requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberReq {
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMemberReq {
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantUserDto {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl From<TenantUser> for TenantUserDto {
    fn from(u: TenantUser) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email,
            role: u.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantUserListDto {
    pub users: Vec<TenantUserDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationDto {
    pub user_id: String,
    pub link: String,
    pub code: String,
}

impl From<Invitation> for InvitationDto {
    fn from(i: Invitation) -> Self {
        Self {
            user_id: i.user_id,
            link: i.link,
            code: i.code,
        }
    }
}

/// Identity payload posted by the identity provider after registration.
/// Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationReq {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub email: String,
}

/// Token hook payload posted by the OAuth2 server. Only the subject is read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenHookReq {
    #[serde(default)]
    pub session: Option<TokenHookSession>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenHookSession {
    #[serde(default)]
    pub id_token: Option<TokenHookIdToken>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenHookIdToken {
    #[serde(default)]
    pub subject: String,
}

impl TokenHookReq {
    #[must_use]
    pub fn subject(&self) -> &str {
        self.session
            .as_ref()
            .and_then(|s| s.id_token.as_ref())
            .map_or("", |t| t.subject.as_str())
    }
}
