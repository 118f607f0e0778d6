#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Tenant authorization
//!
//! Keeps the relationship-based authorization store in step with tenant
//! membership:
//!
//! - [`OpenFgaClient`] - [`TupleStore`] over the OpenFGA HTTP API
//! - [`NoopTupleStore`] - used when authorization is disabled
//! - [`InMemoryTupleStore`] - in-process store for tests and local runs
//! - [`Authorizer`] - grants, role transitions and the tenant tuple cascade

use std::sync::Arc;

pub mod authorizer;
pub mod config;
pub mod memory;
pub mod noop;
pub mod openfga;

pub use authorizer::{Authorizer, CascadeReport, MODEL_V0, RoleTransition};
pub use config::OpenFgaConfig;
pub use memory::InMemoryTupleStore;
pub use noop::NoopTupleStore;
pub use openfga::OpenFgaClient;
pub use tenant_authz_sdk::{AuthzError, TenantRelation, Tuple, TupleStore};

/// Picks the tuple store for `cfg`: OpenFGA when enabled, otherwise the no-op store.
///
/// # Errors
/// [`AuthzError::Config`] when OpenFGA is enabled but misconfigured.
pub fn tuple_store_from_config(cfg: &OpenFgaConfig) -> Result<Arc<dyn TupleStore>, AuthzError> {
    if cfg.enabled {
        tracing::info!(host = %cfg.api_host, store_id = %cfg.store_id, "authorization is enabled");
        Ok(Arc::new(OpenFgaClient::new(cfg)?))
    } else {
        tracing::warn!("authorization is disabled; using the no-op tuple store");
        Ok(Arc::new(NoopTupleStore))
    }
}
