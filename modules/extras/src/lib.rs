//! Extras: tags, custom fields, export templates and the object change log.
//!
//! Besides its own REST resources this module provides the database-backed
//! services every other viewset consumes through [`ApiEnv`].

use std::sync::Arc;

use modkit::viewset::{ApiEnv, Paging};
use sea_orm::DatabaseConnection;

pub mod module;
pub use module::Extras;

#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;

pub use domain::stores::{DbChangeRecorder, DbCustomFieldStore, DbExportTemplateStore};
pub use domain::tags::{clear_tags, resolve_tags, set_tags, tags_for, NestedTag};

/// Viewset services backed by the extras tables.
pub fn api_env(db: DatabaseConnection, paging: Paging, base_url: impl Into<String>) -> ApiEnv {
    ApiEnv {
        custom_fields: Arc::new(DbCustomFieldStore::new(db.clone())),
        export_templates: Arc::new(DbExportTemplateStore::new(db.clone())),
        changes: Arc::new(DbChangeRecorder),
        db,
        paging,
        base_url: base_url.into(),
    }
}
