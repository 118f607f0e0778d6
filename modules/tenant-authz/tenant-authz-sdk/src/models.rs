//! Relation tuples and the naming conventions of the tenant authorization model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Relation and permission names of the tenant authorization model.
pub mod relations {
    pub const OWNER: &str = "owner";
    pub const MEMBER: &str = "member";
    pub const PRIVILEGED: &str = "privileged";
    pub const ADMIN: &str = "admin";

    pub const CAN_VIEW: &str = "can_view";
    pub const CAN_EDIT: &str = "can_edit";
    pub const CAN_CREATE: &str = "can_create";
    pub const CAN_DELETE: &str = "can_delete";
}

/// `type:id` object identifiers.
pub mod objects {
    pub const USER_TYPE: &str = "user";
    pub const TENANT_TYPE: &str = "tenant";
    pub const PRIVILEGED_TYPE: &str = "privileged";

    #[must_use]
    pub fn user(id: &str) -> String {
        format!("{USER_TYPE}:{id}")
    }

    #[must_use]
    pub fn tenant(id: &str) -> String {
        format!("{TENANT_TYPE}:{id}")
    }

    #[must_use]
    pub fn privileged(id: &str) -> String {
        format!("{PRIVILEGED_TYPE}:{id}")
    }

    /// Splits `type:id`. Returns `None` when there is no `:` separator.
    #[must_use]
    pub fn split(object: &str) -> Option<(&str, &str)> {
        object.split_once(':')
    }
}

/// A `(user, relation, object)` grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    pub user: String,
    pub relation: String,
    pub object: String,
}

impl Tuple {
    #[must_use]
    pub fn new(
        user: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.user)
    }
}

/// Filter for paginated reads. `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleFilter {
    pub user: Option<String>,
    pub relation: Option<String>,
    pub object: String,
}

impl TupleFilter {
    /// Every tuple whose object is `object`.
    #[must_use]
    pub fn object(object: impl Into<String>) -> Self {
        Self {
            user: None,
            relation: None,
            object: object.into(),
        }
    }

    #[must_use]
    pub fn matches(&self, tuple: &Tuple) -> bool {
        tuple.object == self.object
            && self.user.as_ref().is_none_or(|u| *u == tuple.user)
            && self.relation.as_ref().is_none_or(|r| *r == tuple.relation)
    }
}

/// One page of a tuple read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadPage {
    pub tuples: Vec<Tuple>,
    /// Cursor for the next page; empty when this is the last page.
    pub continuation_token: String,
}

/// Direct relation a user can hold on a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TenantRelation {
    Owner,
    Member,
}

impl TenantRelation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => relations::OWNER,
            Self::Member => relations::MEMBER,
        }
    }

    /// The tuple granting this relation to `user_id` on `tenant_id`.
    #[must_use]
    pub fn tuple(self, tenant_id: &str, user_id: &str) -> Tuple {
        Tuple::new(objects::user(user_id), self.as_str(), objects::tenant(tenant_id))
    }
}

impl fmt::Display for TenantRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn object_helpers_use_type_prefix() {
        assert_eq!(objects::user("u1"), "user:u1");
        assert_eq!(objects::tenant("t1"), "tenant:t1");
        assert_eq!(objects::privileged("p1"), "privileged:p1");
        assert_eq!(objects::split("tenant:t1"), Some(("tenant", "t1")));
        assert_eq!(objects::split("tenant"), None);
    }

    #[test]
    fn tenant_relation_builds_tuple() {
        let t = TenantRelation::Owner.tuple("t1", "u1");
        assert_eq!(t, Tuple::new("user:u1", "owner", "tenant:t1"));
        assert_eq!(t.to_string(), "tenant:t1#owner@user:u1");
    }

    #[test]
    fn filter_matches_optional_fields() {
        let t = Tuple::new("user:u1", "member", "tenant:t1");
        assert!(TupleFilter::object("tenant:t1").matches(&t));
        assert!(!TupleFilter::object("tenant:t2").matches(&t));

        let by_relation = TupleFilter {
            relation: Some("owner".to_owned()),
            ..TupleFilter::object("tenant:t1")
        };
        assert!(!by_relation.matches(&t));
    }
}
