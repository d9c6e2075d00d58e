//! Tenancy: tenants and the tenant group tree, served through the generic
//! model viewsets.

pub mod module;
pub use module::Tenancy;

pub use domain::relations::{NoRelations, RelatedCounts, TenantRelations};

#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
