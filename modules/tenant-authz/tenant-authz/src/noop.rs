//! Tuple store used when authorization is disabled.

use async_trait::async_trait;
use tenant_authz_sdk::{AuthorizationModel, AuthzError, ReadPage, Tuple, TupleFilter, TupleStore};

/// Allows every check and stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTupleStore;

#[async_trait]
impl TupleStore for NoopTupleStore {
    async fn check(
        &self,
        user: &str,
        relation: &str,
        object: &str,
        _contextual: &[Tuple],
    ) -> Result<bool, AuthzError> {
        tracing::trace!(user, relation, object, "noop check allowed");
        Ok(true)
    }

    async fn list_objects(
        &self,
        _user: &str,
        _relation: &str,
        _object_type: &str,
    ) -> Result<Vec<String>, AuthzError> {
        Ok(Vec::new())
    }

    async fn write_tuple(&self, _tuple: &Tuple) -> Result<(), AuthzError> {
        Ok(())
    }

    async fn delete_tuple(&self, _tuple: &Tuple) -> Result<(), AuthzError> {
        Ok(())
    }

    async fn delete_tuples(&self, _tuples: &[Tuple]) -> Result<(), AuthzError> {
        Ok(())
    }

    async fn read_tuples(
        &self,
        _filter: &TupleFilter,
        _continuation_token: &str,
    ) -> Result<ReadPage, AuthzError> {
        Ok(ReadPage::default())
    }

    async fn compare_model(&self, _expected: &AuthorizationModel) -> Result<bool, AuthzError> {
        Ok(true)
    }
}
