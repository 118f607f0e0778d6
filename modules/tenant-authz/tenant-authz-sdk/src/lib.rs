#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Tenant authorization SDK
//!
//! Public types shared by the authorization store clients and their consumers:
//!
//! - [`Tuple`], [`TupleFilter`], [`ReadPage`] - relation tuples and paginated reads
//! - [`TupleStore`] - API of a relationship-based authorization store
//! - [`AuthorizationModel`] - schema comparison used at startup
//! - [`relations`], [`objects`] - relation names and `type:id` helpers
//! - [`AuthzError`] - error types

pub mod api;
pub mod error;
pub mod model;
pub mod models;

pub use api::TupleStore;
pub use error::AuthzError;
pub use model::AuthorizationModel;
pub use models::{ReadPage, TenantRelation, Tuple, TupleFilter, objects, relations};
