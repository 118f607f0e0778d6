#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Tenant Service
//!
//! Manages tenants and their memberships and keeps the authorization tuple
//! store in step with them.
//!
//! ## Architecture
//!
//! ### API Layer (`tenants::api`)
//! - **Location:** `src/api/`
//! - **Contains:**
//!   - `middleware/transaction.rs` - request-scoped lazy transaction boundary
//!   - `rest/routes.rs` - `/api/v0` routes and the tracing / request id layers
//!   - `rest/handlers.rs` - request handlers
//!   - `rest/dto.rs` - REST-specific DTOs
//!   - `rest/error.rs` - domain errors to RFC 9457 problems
//! - **Rule:** Handlers receive the request [`tenant_db::Session`] from the
//!   middleware and pass it to the service.
//!
//! ### Domain Layer (`tenants::domain`)
//! - **Location:** `src/domain/`
//! - **Contains:**
//!   - `service.rs` - tenant, membership and webhook use cases
//!   - `repo.rs` - relational store trait
//!   - `ports.rs` - identity directory trait
//!   - `model.rs` - tenants, memberships, roles
//!   - `error.rs` - domain error types
//! - **Rule:** MUST NOT import `api::*`.
//!
//! ### Infrastructure Layer (`tenants::infra`)
//! - **Location:** `src/infra/`
//! - **Contains:**
//!   - `storage/` - `SeaORM` entities, migrations and repository
//!   - `kratos.rs` - Kratos admin API client
//!   - `memory_identities.rs` - in-process identity directory

pub mod api;
pub mod config;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;

pub use api::rest::router;
pub use config::TenantsConfig;
pub use domain::error::DomainError;
pub use domain::service::Service;
pub use infra::kratos::{KratosClient, KratosConfig};
pub use infra::storage::SeaOrmTenantsRepository;
pub use infra::storage::migrations::Migrator;

/// Service wired to the sea-orm repository.
pub type ConcreteService = Service<SeaOrmTenantsRepository>;
