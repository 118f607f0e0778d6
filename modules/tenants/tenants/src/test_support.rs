#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use axum::Router;
use tenant_authz::{Authorizer, InMemoryTupleStore};
use tenant_authz_sdk::TupleStore;
use tenant_db::{Db, DbConfig};
use uuid::Uuid;

use crate::config::TenantsConfig;
use crate::domain::model::{NewTenant, Role};
use crate::domain::repo::TenantsRepository;
use crate::infra::memory_identities::InMemoryIdentityDirectory;
use crate::infra::storage::SeaOrmTenantsRepository;
use crate::infra::storage::migrations::Migrator;
use crate::{ConcreteService, Service};

/// Create an in-memory database for testing.
pub async fn inmem_db() -> Db {
    let db = Db::connect(&DbConfig::sqlite_memory())
        .await
        .expect("Failed to connect to in-memory database");
    db.migrate::<Migrator>()
        .await
        .expect("Failed to run migrations");
    db
}

/// Service under test together with its collaborators.
pub struct Harness {
    pub db: Db,
    pub service: Arc<ConcreteService>,
    pub tuples: Arc<InMemoryTupleStore>,
    pub identities: Arc<InMemoryIdentityDirectory>,
    pub config: TenantsConfig,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_tuple_store(Arc::new(InMemoryTupleStore::new()), None).await
    }

    /// Uses `store` for authorization calls while `tuples` stays available for
    /// assertions. When `store` is `None`, `tuples` itself is used.
    pub async fn with_tuple_store(
        tuples: Arc<InMemoryTupleStore>,
        store: Option<Arc<dyn TupleStore>>,
    ) -> Self {
        let db = inmem_db().await;
        let identities = Arc::new(InMemoryIdentityDirectory::new());
        let store = store.unwrap_or_else(|| tuples.clone() as Arc<dyn TupleStore>);
        let authz = Arc::new(Authorizer::new(store).expect("embedded model parses"));
        let config = TenantsConfig::default();
        let service = Arc::new(Service::new(
            Arc::new(SeaOrmTenantsRepository::new()),
            authz,
            identities.clone(),
            config.clone(),
        ));
        Self {
            db,
            service,
            tuples,
            identities,
            config,
        }
    }

    #[must_use]
    pub fn router(&self) -> Router {
        crate::router(self.db.clone(), self.service.clone())
    }

    /// Inserts a tenant row directly, bypassing the service.
    pub async fn seed_tenant(&self, name: &str, enabled: bool) -> Uuid {
        SeaOrmTenantsRepository::new()
            .create_tenant(
                &self.db.session(),
                NewTenant {
                    name: name.to_owned(),
                    enabled,
                },
            )
            .await
            .expect("Failed to seed tenant")
            .id
    }

    /// Inserts a membership row directly, bypassing the service.
    pub async fn seed_member(&self, tenant_id: Uuid, user_id: &str, role: Role) {
        SeaOrmTenantsRepository::new()
            .add_member(&self.db.session(), tenant_id, user_id, role)
            .await
            .expect("Failed to seed membership");
    }

    pub async fn tenant_count(&self) -> usize {
        SeaOrmTenantsRepository::new()
            .list_tenants(&self.db.session())
            .await
            .expect("Failed to list tenants")
            .len()
    }
}
