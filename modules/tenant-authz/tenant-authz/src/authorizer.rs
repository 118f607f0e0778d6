//! Tuple synchronization for tenant operations.
//!
//! Every decision made here consults the tuple store only. Whether a tenant or
//! membership exists is the relational store's business; this module never
//! looks at it.

use std::sync::Arc;

use tenant_authz_sdk::{
    AuthorizationModel, AuthzError, TenantRelation, Tuple, TupleFilter, TupleStore, objects,
    relations,
};

/// Expected model, as loaded into the store by deployment tooling.
pub const MODEL_V0: &str = include_str!("../model/v0.json");

/// Outcome of a role transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTransition {
    /// Both roles map to the same relation; nothing was written.
    Unchanged,
    /// New relation granted and old one removed.
    Completed,
    /// New relation granted; removing the old one failed and the stale
    /// tuple is left behind.
    StaleRelationKept,
}

/// Summary of a tenant tuple cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub pages: usize,
    pub deleted: usize,
}

#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn TupleStore>,
    model: AuthorizationModel,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("model_types", &self.model.type_names())
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    /// Authorizer expecting the embedded v0 model.
    ///
    /// # Errors
    /// [`AuthzError::InvalidAuthorizationModel`] if the embedded model does not parse.
    pub fn new(store: Arc<dyn TupleStore>) -> Result<Self, AuthzError> {
        let model = AuthorizationModel::from_json(MODEL_V0)
            .map_err(|e| AuthzError::InvalidAuthorizationModel(e.to_string()))?;
        Ok(Self::with_model(store, model))
    }

    #[must_use]
    pub fn with_model(store: Arc<dyn TupleStore>, model: AuthorizationModel) -> Self {
        Self { store, model }
    }

    #[must_use]
    pub fn expected_model(&self) -> &AuthorizationModel {
        &self.model
    }

    /// Fails unless the store's loaded model matches the expected one.
    /// Meant to run once at startup.
    ///
    /// # Errors
    /// [`AuthzError::InvalidAuthorizationModel`] on mismatch, or the store failure.
    #[tracing::instrument(skip(self))]
    pub async fn validate_model(&self) -> Result<(), AuthzError> {
        if self.store.compare_model(&self.model).await? {
            tracing::info!("authorization model matches");
            Ok(())
        } else {
            Err(AuthzError::InvalidAuthorizationModel(
                "model loaded in the authorization store differs from the expected v0 model"
                    .to_owned(),
            ))
        }
    }

    // ---- queries ----

    /// # Errors
    /// Store failure.
    pub async fn check(
        &self,
        user: &str,
        relation: &str,
        object: &str,
        contextual: &[Tuple],
    ) -> Result<bool, AuthzError> {
        self.store.check(user, relation, object, contextual).await
    }

    /// # Errors
    /// Store failure.
    pub async fn list_objects(
        &self,
        user: &str,
        relation: &str,
        object_type: &str,
    ) -> Result<Vec<String>, AuthzError> {
        self.store.list_objects(user, relation, object_type).await
    }

    /// Keeps the `candidates` on which `user` has `relation`.
    ///
    /// # Errors
    /// Store failure.
    pub async fn filter_objects(
        &self,
        user: &str,
        relation: &str,
        object_type: &str,
        candidates: &[String],
    ) -> Result<Vec<String>, AuthzError> {
        let allowed = self.list_objects(user, relation, object_type).await?;
        Ok(candidates
            .iter()
            .filter(|c| allowed.contains(c))
            .cloned()
            .collect())
    }

    /// Whether `user_id` has `relation` on `tenant_id`.
    ///
    /// # Errors
    /// Store failure.
    pub async fn check_tenant_access(
        &self,
        tenant_id: &str,
        user_id: &str,
        relation: &str,
    ) -> Result<bool, AuthzError> {
        self.check(
            &objects::user(user_id),
            relation,
            &objects::tenant(tenant_id),
            &[],
        )
        .await
    }

    // ---- grants ----

    /// # Errors
    /// Store failure.
    #[tracing::instrument(skip(self))]
    pub async fn assign_relation(
        &self,
        tenant_id: &str,
        user_id: &str,
        relation: TenantRelation,
    ) -> Result<(), AuthzError> {
        self.store
            .write_tuple(&relation.tuple(tenant_id, user_id))
            .await
    }

    /// # Errors
    /// Store failure.
    #[tracing::instrument(skip(self))]
    pub async fn remove_relation(
        &self,
        tenant_id: &str,
        user_id: &str,
        relation: TenantRelation,
    ) -> Result<(), AuthzError> {
        self.store
            .delete_tuple(&relation.tuple(tenant_id, user_id))
            .await
    }

    /// # Errors
    /// Store failure.
    pub async fn assign_tenant_owner(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<(), AuthzError> {
        self.assign_relation(tenant_id, user_id, TenantRelation::Owner)
            .await
    }

    /// # Errors
    /// Store failure.
    pub async fn assign_tenant_member(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<(), AuthzError> {
        self.assign_relation(tenant_id, user_id, TenantRelation::Member)
            .await
    }

    /// # Errors
    /// Store failure.
    pub async fn remove_tenant_owner(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<(), AuthzError> {
        self.remove_relation(tenant_id, user_id, TenantRelation::Owner)
            .await
    }

    /// # Errors
    /// Store failure.
    pub async fn remove_tenant_member(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<(), AuthzError> {
        self.remove_relation(tenant_id, user_id, TenantRelation::Member)
            .await
    }

    /// Makes `user_id` an admin of the privileged group `privileged_id`.
    ///
    /// # Errors
    /// Store failure.
    #[tracing::instrument(skip(self))]
    pub async fn assign_privileged_admin(
        &self,
        privileged_id: &str,
        user_id: &str,
    ) -> Result<(), AuthzError> {
        self.store
            .write_tuple(&Tuple::new(
                objects::user(user_id),
                relations::ADMIN,
                objects::privileged(privileged_id),
            ))
            .await
    }

    /// Lets admins of `privileged_id` administer `tenant_id`.
    ///
    /// # Errors
    /// Store failure.
    #[tracing::instrument(skip(self))]
    pub async fn link_tenant_to_privileged(
        &self,
        tenant_id: &str,
        privileged_id: &str,
    ) -> Result<(), AuthzError> {
        self.store
            .write_tuple(&Tuple::new(
                objects::privileged(privileged_id),
                relations::PRIVILEGED,
                objects::tenant(tenant_id),
            ))
            .await
    }

    /// Moves `user_id` from relation `from` to relation `to` on `tenant_id`.
    ///
    /// The new relation is written first and the old one removed afterwards,
    /// so the user never holds neither. A failed grant is returned; a failed
    /// removal is logged and reported as [`RoleTransition::StaleRelationKept`].
    ///
    /// # Errors
    /// Store failure while granting the new relation.
    #[tracing::instrument(skip(self))]
    pub async fn transition_relation(
        &self,
        tenant_id: &str,
        user_id: &str,
        from: TenantRelation,
        to: TenantRelation,
    ) -> Result<RoleTransition, AuthzError> {
        if from == to {
            return Ok(RoleTransition::Unchanged);
        }

        self.assign_relation(tenant_id, user_id, to).await?;

        match self.remove_relation(tenant_id, user_id, from).await {
            Ok(()) => Ok(RoleTransition::Completed),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    tenant_id,
                    user_id,
                    stale_relation = %from,
                    "failed to remove previous relation; user keeps both"
                );
                Ok(RoleTransition::StaleRelationKept)
            }
        }
    }

    /// Deletes every tuple whose object is `tenant:<tenant_id>`, one page at a time.
    ///
    /// Stops on an empty page or an empty continuation token. Any failure aborts
    /// the cascade; tuples already deleted stay deleted.
    ///
    /// # Errors
    /// Store failure on any read or delete.
    #[tracing::instrument(skip(self))]
    pub async fn delete_tenant(&self, tenant_id: &str) -> Result<CascadeReport, AuthzError> {
        let filter = TupleFilter::object(objects::tenant(tenant_id));
        let mut report = CascadeReport::default();
        let mut token = String::new();

        loop {
            let page = self.store.read_tuples(&filter, &token).await?;
            if page.tuples.is_empty() {
                break;
            }

            self.store.delete_tuples(&page.tuples).await?;
            report.pages += 1;
            report.deleted += page.tuples.len();

            if page.continuation_token.is_empty() {
                break;
            }
            token = page.continuation_token;
        }

        tracing::debug!(pages = report.pages, deleted = report.deleted, "tenant tuples removed");
        Ok(report)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::memory::InMemoryTupleStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tenant_authz_sdk::ReadPage;

    /// Store that replays scripted read pages and records every call.
    #[derive(Default)]
    struct ScriptedStore {
        pages: Mutex<VecDeque<Result<ReadPage, AuthzError>>>,
        reads: Mutex<Vec<String>>,
        deleted_batches: Mutex<Vec<Vec<Tuple>>>,
        fail_delete_of: Option<String>,
        fail_write: bool,
        model_matches: bool,
        /// Relations held by `user:u1` on `tenant:t1` at the moment each delete started.
        snapshots: Mutex<Vec<Vec<String>>>,
        held: Mutex<Vec<Tuple>>,
    }

    impl ScriptedStore {
        fn with_pages(pages: Vec<Result<ReadPage, AuthzError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                ..Self::default()
            }
        }
    }

    fn page(tenant: &str, users: &[&str], token: &str) -> ReadPage {
        ReadPage {
            tuples: users
                .iter()
                .map(|u| Tuple::new(objects::user(u), "member", objects::tenant(tenant)))
                .collect(),
            continuation_token: token.to_owned(),
        }
    }

    #[async_trait]
    impl TupleStore for ScriptedStore {
        async fn check(&self, _: &str, _: &str, _: &str, _: &[Tuple]) -> Result<bool, AuthzError> {
            Ok(false)
        }

        async fn list_objects(&self, _: &str, _: &str, _: &str) -> Result<Vec<String>, AuthzError> {
            Ok(vec!["tenant:a".to_owned(), "tenant:c".to_owned()])
        }

        async fn write_tuple(&self, tuple: &Tuple) -> Result<(), AuthzError> {
            if self.fail_write {
                return Err(AuthzError::Transport("connection refused".to_owned()));
            }
            self.held.lock().push(tuple.clone());
            Ok(())
        }

        async fn delete_tuple(&self, tuple: &Tuple) -> Result<(), AuthzError> {
            let relations: Vec<String> =
                self.held.lock().iter().map(|t| t.relation.clone()).collect();
            self.snapshots.lock().push(relations);
            if self.fail_delete_of.as_deref() == Some(tuple.relation.as_str()) {
                return Err(AuthzError::api(500, "internal", "boom"));
            }
            self.held.lock().retain(|t| t != tuple);
            Ok(())
        }

        async fn delete_tuples(&self, tuples: &[Tuple]) -> Result<(), AuthzError> {
            self.deleted_batches.lock().push(tuples.to_vec());
            Ok(())
        }

        async fn read_tuples(
            &self,
            filter: &TupleFilter,
            token: &str,
        ) -> Result<ReadPage, AuthzError> {
            assert_eq!(filter.user, None);
            assert_eq!(filter.relation, None);
            self.reads.lock().push(token.to_owned());
            self.pages
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(ReadPage::default()))
        }

        async fn compare_model(&self, _: &AuthorizationModel) -> Result<bool, AuthzError> {
            Ok(self.model_matches)
        }
    }

    fn authorizer(store: Arc<dyn TupleStore>) -> Authorizer {
        Authorizer::new(store).unwrap()
    }

    // =========================================================================
    // Cascade
    // =========================================================================

    #[tokio::test]
    async fn cascade_follows_tokens_until_empty() {
        let store = Arc::new(ScriptedStore::with_pages(vec![
            Ok(page("t1", &["a", "b"], "t1")),
            Ok(page("t1", &["c", "d"], "t2")),
            Ok(page("t1", &["e"], "")),
        ]));
        let authz = authorizer(store.clone());

        let report = authz.delete_tenant("t1").await.unwrap();

        assert_eq!(*store.reads.lock(), vec!["", "t1", "t2"]);
        let batches = store.deleted_batches.lock();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[2][0].user, "user:e");
        assert_eq!(report, CascadeReport { pages: 3, deleted: 5 });
    }

    #[tokio::test]
    async fn cascade_on_clean_tenant_stops_after_one_empty_read() {
        let store = Arc::new(ScriptedStore::with_pages(vec![Ok(page("t1", &[], "stale"))]));
        let authz = authorizer(store.clone());

        let report = authz.delete_tenant("t1").await.unwrap();

        assert_eq!(store.reads.lock().len(), 1);
        assert!(store.deleted_batches.lock().is_empty());
        assert_eq!(report, CascadeReport::default());
    }

    #[tokio::test]
    async fn cascade_aborts_on_read_failure() {
        let store = Arc::new(ScriptedStore::with_pages(vec![
            Ok(page("t1", &["a"], "t1")),
            Err(AuthzError::Transport("reset".to_owned())),
            Ok(page("t1", &["b"], "")),
        ]));
        let authz = authorizer(store.clone());

        let err = authz.delete_tenant("t1").await.unwrap_err();

        assert!(matches!(err, AuthzError::Transport(_)));
        assert_eq!(store.reads.lock().len(), 2);
        assert_eq!(store.deleted_batches.lock().len(), 1);
    }

    #[tokio::test]
    async fn cascade_twice_is_clean_with_real_pagination() {
        let store = Arc::new(InMemoryTupleStore::new().with_page_size(2));
        let authz = authorizer(store.clone());
        for u in ["a", "b", "c"] {
            authz.assign_tenant_member("t1", u).await.unwrap();
        }
        authz.assign_tenant_owner("t2", "a").await.unwrap();

        let first = authz.delete_tenant("t1").await.unwrap();
        let second = authz.delete_tenant("t1").await.unwrap();

        assert_eq!(first.deleted, 3);
        assert_eq!(second, CascadeReport::default());
        assert_eq!(store.tuples().len(), 1);
    }

    // =========================================================================
    // Role transitions
    // =========================================================================

    #[tokio::test]
    async fn member_to_owner_grants_before_revoking() {
        let store = Arc::new(ScriptedStore::default());
        store
            .held
            .lock()
            .push(TenantRelation::Member.tuple("t1", "u1"));
        let authz = authorizer(store.clone());

        let outcome = authz
            .transition_relation("t1", "u1", TenantRelation::Member, TenantRelation::Owner)
            .await
            .unwrap();

        assert_eq!(outcome, RoleTransition::Completed);
        let snapshots = store.snapshots.lock();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0], vec!["member", "owner"]);
        assert_eq!(*store.held.lock(), vec![TenantRelation::Owner.tuple("t1", "u1")]);
    }

    #[tokio::test]
    async fn same_relation_is_a_no_op() {
        let store = Arc::new(ScriptedStore::default());
        let authz = authorizer(store.clone());

        let outcome = authz
            .transition_relation("t1", "u1", TenantRelation::Member, TenantRelation::Member)
            .await
            .unwrap();

        assert_eq!(outcome, RoleTransition::Unchanged);
        assert!(store.held.lock().is_empty());
        assert!(store.snapshots.lock().is_empty());
    }

    #[tokio::test]
    async fn failed_grant_is_returned_and_old_relation_kept() {
        let store = Arc::new(ScriptedStore {
            fail_write: true,
            ..ScriptedStore::default()
        });
        store
            .held
            .lock()
            .push(TenantRelation::Owner.tuple("t1", "u1"));
        let authz = authorizer(store.clone());

        let err = authz
            .transition_relation("t1", "u1", TenantRelation::Owner, TenantRelation::Member)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthzError::Transport(_)));
        assert!(store.snapshots.lock().is_empty());
        assert_eq!(store.held.lock().len(), 1);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failed_revoke_is_logged_and_swallowed() {
        let store = Arc::new(ScriptedStore {
            fail_delete_of: Some("owner".to_owned()),
            ..ScriptedStore::default()
        });
        let authz = authorizer(store.clone());

        let outcome = authz
            .transition_relation("t1", "u1", TenantRelation::Owner, TenantRelation::Member)
            .await
            .unwrap();

        assert_eq!(outcome, RoleTransition::StaleRelationKept);
        assert!(logs_contain("failed to remove previous relation"));
    }

    // =========================================================================
    // Grants, checks, model
    // =========================================================================

    #[tokio::test]
    async fn owner_round_trip() {
        let store = Arc::new(InMemoryTupleStore::new());
        let authz = authorizer(store);

        authz.assign_tenant_owner("t1", "u1").await.unwrap();
        assert!(authz.check_tenant_access("t1", "u1", "owner").await.unwrap());

        authz.remove_tenant_owner("t1", "u1").await.unwrap();
        assert!(!authz.check_tenant_access("t1", "u1", "owner").await.unwrap());
    }

    #[tokio::test]
    async fn privileged_links_use_expected_tuples() {
        let store = Arc::new(InMemoryTupleStore::new());
        let authz = authorizer(store.clone());

        authz.assign_privileged_admin("p1", "u1").await.unwrap();
        authz.link_tenant_to_privileged("t1", "p1").await.unwrap();

        assert!(store.contains(&Tuple::new("user:u1", "admin", "privileged:p1")));
        assert!(store.contains(&Tuple::new("privileged:p1", "privileged", "tenant:t1")));
    }

    #[tokio::test]
    async fn filter_objects_keeps_allowed_candidates() {
        let authz = authorizer(Arc::new(ScriptedStore::default()));
        let candidates = vec![
            "tenant:a".to_owned(),
            "tenant:b".to_owned(),
            "tenant:c".to_owned(),
        ];

        let kept = authz
            .filter_objects("user:u1", "can_view", "tenant", &candidates)
            .await
            .unwrap();

        assert_eq!(kept, vec!["tenant:a".to_owned(), "tenant:c".to_owned()]);
    }

    #[tokio::test]
    async fn model_mismatch_is_invalid_model() {
        let authz = authorizer(Arc::new(ScriptedStore::default()));
        let err = authz.validate_model().await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidAuthorizationModel(_)));

        let ok = authorizer(Arc::new(ScriptedStore {
            model_matches: true,
            ..ScriptedStore::default()
        }));
        ok.validate_model().await.unwrap();
    }

    #[test]
    fn embedded_model_defines_tenant_types() {
        let model = AuthorizationModel::from_json(MODEL_V0).unwrap();
        assert_eq!(model.type_names(), vec!["user", "privileged", "tenant"]);
        assert!(model.equivalent(&model.clone()));
    }
}
