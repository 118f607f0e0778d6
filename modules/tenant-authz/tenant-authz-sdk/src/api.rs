//! API of a relationship-based authorization store.

use async_trait::async_trait;

use crate::error::AuthzError;
use crate::model::AuthorizationModel;
use crate::models::{ReadPage, Tuple, TupleFilter};

/// Client of a relationship-based authorization store holding `(user, relation, object)` tuples.
///
/// This store is the sole source of truth for access decisions. Nothing here
/// participates in relational transactions.
#[async_trait]
pub trait TupleStore: Send + Sync {
    /// Whether `user` has `relation` on `object`, taking `contextual` tuples into
    /// account as if they were stored.
    ///
    /// # Errors
    /// Transport or API failures of the store.
    async fn check(
        &self,
        user: &str,
        relation: &str,
        object: &str,
        contextual: &[Tuple],
    ) -> Result<bool, AuthzError>;

    /// Objects of `object_type` on which `user` has `relation`.
    ///
    /// # Errors
    /// Transport or API failures of the store.
    async fn list_objects(
        &self,
        user: &str,
        relation: &str,
        object_type: &str,
    ) -> Result<Vec<String>, AuthzError>;

    /// Stores a tuple. Writing an existing tuple succeeds.
    ///
    /// # Errors
    /// Transport or API failures of the store.
    async fn write_tuple(&self, tuple: &Tuple) -> Result<(), AuthzError>;

    /// Removes a tuple. Removing a missing tuple succeeds.
    ///
    /// # Errors
    /// Transport or API failures of the store.
    async fn delete_tuple(&self, tuple: &Tuple) -> Result<(), AuthzError>;

    /// Removes a batch of tuples in one request.
    ///
    /// # Errors
    /// Transport or API failures of the store.
    async fn delete_tuples(&self, tuples: &[Tuple]) -> Result<(), AuthzError>;

    /// Reads one page of tuples matching `filter`, starting at `continuation_token`
    /// (empty for the first page). An empty token in the result means no more pages.
    ///
    /// # Errors
    /// Transport or API failures of the store.
    async fn read_tuples(
        &self,
        filter: &TupleFilter,
        continuation_token: &str,
    ) -> Result<ReadPage, AuthzError>;

    /// Whether the model loaded in the store equals `expected`.
    ///
    /// # Errors
    /// Transport or API failures of the store.
    async fn compare_model(&self, expected: &AuthorizationModel) -> Result<bool, AuthzError>;
}
