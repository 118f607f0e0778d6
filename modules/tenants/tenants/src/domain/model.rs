use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tenant_authz_sdk::TenantRelation;
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

/// Organization that users are members of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub enabled: bool,
}

/// Fields for a new tenant row. The id and timestamp are assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTenant {
    pub name: String,
    pub enabled: bool,
}

/// Partial tenant update. Only fields named in the accompanying path list are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPatch {
    pub name: Option<String>,
    pub enabled: Option<bool>,
}

impl TenantPatch {
    /// Whether the patch carries a value for `field`.
    #[must_use]
    pub fn has(&self, field: TenantField) -> bool {
        match field {
            TenantField::Name => self.name.is_some(),
            TenantField::Enabled => self.enabled.is_some(),
        }
    }
}

/// Field of a tenant that an update may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantField {
    Name,
    Enabled,
}

impl TenantField {
    pub const ALL: [TenantField; 2] = [TenantField::Name, TenantField::Enabled];

    /// Resolves an update path list. An empty list selects every field.
    ///
    /// # Errors
    /// [`DomainError::Validation`] for an unknown path.
    pub fn parse_paths<S: AsRef<str>>(paths: &[S]) -> Result<Vec<TenantField>, DomainError> {
        if paths.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        let mut fields = Vec::with_capacity(paths.len());
        for path in paths {
            let field = match path.as_ref() {
                "name" => TenantField::Name,
                "enabled" => TenantField::Enabled,
                other => {
                    return Err(DomainError::validation(
                        "paths",
                        format!("unknown update path '{other}'"),
                    ));
                }
            };
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        Ok(fields)
    }
}

/// Role of a user inside a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    /// Relation granted in the tuple store for this role.
    #[must_use]
    pub fn relation(self) -> TenantRelation {
        match self {
            Role::Owner => TenantRelation::Owner,
            Role::Admin | Role::Member => TenantRelation::Member,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            other => Err(DomainError::validation(
                "role",
                format!("unknown role '{other}'"),
            )),
        }
    }
}

/// A user's membership in a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub kratos_identity_id: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Tenant member enriched with identity data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

/// Recovery link that lets an invited user set their credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub user_id: String,
    pub link: String,
    pub code: String,
}

/// Claims injected into issued tokens by the token hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub session: SessionClaims,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub id_token: TenantClaims,
    pub access_token: TenantClaims,
}

/// Absent from the serialized claims when the user has no active tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantClaims {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tenants: Vec<Uuid>,
}

impl TokenClaims {
    #[must_use]
    pub fn for_tenants(tenants: Vec<Uuid>) -> Self {
        Self {
            session: SessionClaims {
                id_token: TenantClaims {
                    tenants: tenants.clone(),
                },
                access_token: TenantClaims { tenants },
            },
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn admin_and_member_share_the_member_relation() {
        assert_eq!(Role::Owner.relation(), TenantRelation::Owner);
        assert_eq!(Role::Admin.relation(), TenantRelation::Member);
        assert_eq!(Role::Member.relation(), TenantRelation::Member);
    }

    #[test]
    fn role_parses_lowercase_names_only() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!(matches!(
            "Owner".parse::<Role>(),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn empty_paths_select_every_field() {
        let none: [&str; 0] = [];
        assert_eq!(
            TenantField::parse_paths(&none).unwrap(),
            TenantField::ALL.to_vec()
        );
    }

    #[test]
    fn unknown_path_is_rejected() {
        let err = TenantField::parse_paths(&["name", "created_at"]).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn token_claims_shape() {
        let id = Uuid::now_v7();
        let json = serde_json::to_value(TokenClaims::for_tenants(vec![id])).unwrap();
        assert_eq!(json["session"]["id_token"]["tenants"][0], id.to_string());
        assert_eq!(json["session"]["access_token"]["tenants"][0], id.to_string());
    }

    #[test]
    fn token_claims_without_tenants_are_empty_objects() {
        let json = serde_json::to_value(TokenClaims::for_tenants(Vec::new())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "session": { "id_token": {}, "access_token": {} } })
        );
    }
}
