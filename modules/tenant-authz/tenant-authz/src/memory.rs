//! In-process tuple store for tests and local development.
//!
//! Checks match stored and contextual tuples directly; relation rewrites of the
//! model (`can_view`, `admin from privileged`, ...) are not evaluated.
//! Continuation tokens are insertion cursors, so deleting a page does not shift
//! the next one.

use async_trait::async_trait;
use parking_lot::Mutex;
use tenant_authz_sdk::{
    AuthorizationModel, AuthzError, ReadPage, Tuple, TupleFilter, TupleStore, objects,
};

const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    tuples: Vec<(u64, Tuple)>,
}

#[derive(Debug)]
pub struct InMemoryTupleStore {
    inner: Mutex<Inner>,
    page_size: usize,
    model: Option<AuthorizationModel>,
}

impl Default for InMemoryTupleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTupleStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            page_size: DEFAULT_PAGE_SIZE,
            model: None,
        }
    }

    /// Caps every read page at `page_size` tuples (at least one).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Model reported as loaded. Without one, every model compares equal.
    #[must_use]
    pub fn with_model(mut self, model: AuthorizationModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Snapshot of every stored tuple in insertion order.
    #[must_use]
    pub fn tuples(&self) -> Vec<Tuple> {
        self.inner.lock().tuples.iter().map(|(_, t)| t.clone()).collect()
    }

    #[must_use]
    pub fn contains(&self, tuple: &Tuple) -> bool {
        self.inner.lock().tuples.iter().any(|(_, t)| t == tuple)
    }
}

#[async_trait]
impl TupleStore for InMemoryTupleStore {
    async fn check(
        &self,
        user: &str,
        relation: &str,
        object: &str,
        contextual: &[Tuple],
    ) -> Result<bool, AuthzError> {
        let wanted = Tuple::new(user, relation, object);
        Ok(contextual.contains(&wanted) || self.contains(&wanted))
    }

    async fn list_objects(
        &self,
        user: &str,
        relation: &str,
        object_type: &str,
    ) -> Result<Vec<String>, AuthzError> {
        let inner = self.inner.lock();
        let mut out: Vec<String> = inner
            .tuples
            .iter()
            .map(|(_, t)| t)
            .filter(|t| t.user == user && t.relation == relation)
            .filter(|t| objects::split(&t.object).is_some_and(|(ty, _)| ty == object_type))
            .map(|t| t.object.clone())
            .collect();
        out.dedup();
        Ok(out)
    }

    async fn write_tuple(&self, tuple: &Tuple) -> Result<(), AuthzError> {
        let mut inner = self.inner.lock();
        if inner.tuples.iter().any(|(_, t)| t == tuple) {
            return Ok(());
        }
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.tuples.push((seq, tuple.clone()));
        Ok(())
    }

    async fn delete_tuple(&self, tuple: &Tuple) -> Result<(), AuthzError> {
        self.inner.lock().tuples.retain(|(_, t)| t != tuple);
        Ok(())
    }

    async fn delete_tuples(&self, tuples: &[Tuple]) -> Result<(), AuthzError> {
        self.inner.lock().tuples.retain(|(_, t)| !tuples.contains(t));
        Ok(())
    }

    async fn read_tuples(
        &self,
        filter: &TupleFilter,
        continuation_token: &str,
    ) -> Result<ReadPage, AuthzError> {
        let after = if continuation_token.is_empty() {
            0
        } else {
            continuation_token.parse::<u64>().map_err(|_| {
                AuthzError::api(400, "invalid_continuation_token", continuation_token)
            })?
        };

        let inner = self.inner.lock();
        let mut matching = inner
            .tuples
            .iter()
            .filter(|(seq, t)| *seq > after && filter.matches(t));

        let page: Vec<(u64, Tuple)> = matching.by_ref().take(self.page_size).cloned().collect();
        let has_more = matching.next().is_some();

        let continuation_token = match (has_more, page.last()) {
            (true, Some((seq, _))) => seq.to_string(),
            _ => String::new(),
        };
        Ok(ReadPage {
            tuples: page.into_iter().map(|(_, t)| t).collect(),
            continuation_token,
        })
    }

    async fn compare_model(&self, expected: &AuthorizationModel) -> Result<bool, AuthzError> {
        Ok(self.model.as_ref().is_none_or(|m| m.equivalent(expected)))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn member(user: &str, tenant: &str) -> Tuple {
        Tuple::new(objects::user(user), "member", objects::tenant(tenant))
    }

    #[tokio::test]
    async fn pages_survive_deleting_previous_page() {
        let store = InMemoryTupleStore::new().with_page_size(2);
        for u in ["a", "b", "c", "d", "e"] {
            store.write_tuple(&member(u, "t1")).await.unwrap();
        }
        store.write_tuple(&member("a", "t2")).await.unwrap();

        let filter = TupleFilter::object(objects::tenant("t1"));
        let mut token = String::new();
        let mut seen = Vec::new();
        loop {
            let page = store.read_tuples(&filter, &token).await.unwrap();
            store.delete_tuples(&page.tuples).await.unwrap();
            seen.extend(page.tuples);
            if page.continuation_token.is_empty() {
                break;
            }
            token = page.continuation_token;
        }

        assert_eq!(seen.len(), 5);
        assert_eq!(store.tuples(), vec![member("a", "t2")]);
    }

    #[tokio::test]
    async fn writes_are_idempotent() {
        let store = InMemoryTupleStore::new();
        store.write_tuple(&member("a", "t1")).await.unwrap();
        store.write_tuple(&member("a", "t1")).await.unwrap();
        assert_eq!(store.tuples().len(), 1);
        store.delete_tuple(&member("z", "t1")).await.unwrap();
        assert_eq!(store.tuples().len(), 1);
    }

    #[tokio::test]
    async fn check_considers_contextual_tuples() {
        let store = InMemoryTupleStore::new();
        let t = member("a", "t1");
        assert!(!store.check(&t.user, &t.relation, &t.object, &[]).await.unwrap());
        assert!(
            store
                .check(&t.user, &t.relation, &t.object, std::slice::from_ref(&t))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn list_objects_filters_by_type() {
        let store = InMemoryTupleStore::new();
        store.write_tuple(&member("a", "t1")).await.unwrap();
        store
            .write_tuple(&Tuple::new("user:a", "member", "privileged:p1"))
            .await
            .unwrap();

        let objs = store.list_objects("user:a", "member", "tenant").await.unwrap();
        assert_eq!(objs, vec!["tenant:t1".to_owned()]);
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let store = InMemoryTupleStore::new();
        let err = store
            .read_tuples(&TupleFilter::object("tenant:t1"), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Api { status: 400, .. }));
    }
}
