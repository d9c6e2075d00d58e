//! # ModKit
//!
//! Building blocks for the REST modules of the tenancy server:
//!
//! - [`api`]: RFC 9457 problems, the unified [`api::ApiError`], caller
//!   identity and request ids
//! - [`viewset`]: the [`viewset::ModelViewSet`] trait and the generic
//!   handlers layered on it (brief mode, custom fields, export templates,
//!   sequential/bulk writes, conformance checks)
//! - [`contracts`]: what a module implements to own tables and routes

pub use async_trait::async_trait;

pub mod api;
pub mod contracts;
pub mod shutdown;
pub mod viewset;

pub use api::{ApiError, ApiResult, Identity, Problem, ProblemResponse};
pub use contracts::{DbModule, RestfulModule};
pub use viewset::{ApiEnv, ContentType, ModelViewSet, SerializerContext};
