//! Generic model viewsets.
//!
//! A resource implements [`ModelViewSet`] once (queryset, serialization and
//! the three write primitives). The request behaviors layered on top are
//! written once, generically, in the submodules:
//!
//! * [`brief`]: `?brief=true` selection and queryset pruning
//! * [`custom_fields`]: custom field definitions in the serializer context
//! * [`export`]: `?export=<template>` rendering
//! * [`bulk`]: sequential create, bulk update and bulk destroy
//! * [`validation`]: post-write conformance against the scoped queryset
//!
//! [`routes::viewset_router`] wires them to a collection/detail route pair.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, FromQueryResult,
    ModelTrait, Select,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::api::{ApiError, ApiResult, Identity};

pub mod brief;
pub mod bulk;
pub mod changes;
pub mod custom_fields;
pub mod export;
pub mod fields;
pub mod handlers;
pub mod pagination;
pub mod query;
pub mod routes;
pub mod validation;
pub mod validators;

pub use brief::QueryPlan;
pub use changes::{ChangeAction, ChangeRecorder, ObjectChange};
pub use custom_fields::{CustomFieldDefinition, CustomFieldStore, CustomFieldType};
pub use export::{ExportTemplate, ExportTemplateStore};
pub use fields::{deserialize_some, RelatedRef};
pub use pagination::{Paginated, Paging};
pub use query::{ListParams, ObjectFilter};
pub use routes::viewset_router;
pub use validators::FieldErrors;

/// Object type label, `app_label.model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentType {
    pub app_label: &'static str,
    pub model: &'static str,
}

impl ContentType {
    pub const fn new(app_label: &'static str, model: &'static str) -> Self {
        Self { app_label, model }
    }

    pub fn label(&self) -> String {
        format!("{}.{}", self.app_label, self.model)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_label, self.model)
    }
}

/// Per-request state handed to serializers and write primitives.
#[derive(Debug, Clone, Default)]
pub struct SerializerContext {
    pub identity: Identity,
    pub request_id: Option<String>,
    pub base_url: String,
    pub plan: QueryPlan,
    /// Definitions bound to the resource's content type; empty when the
    /// resource does not carry custom fields.
    pub custom_fields: Vec<CustomFieldDefinition>,
}

impl SerializerContext {
    /// Absolute (or root-relative) URL of an object.
    pub fn url(&self, base_path: &str, id: i64) -> String {
        format!("{}{}{}/", self.base_url, base_path, id)
    }

    /// Same request context under a different query plan.
    pub fn with_plan(&self, plan: QueryPlan) -> Self {
        Self {
            plan,
            ..self.clone()
        }
    }
}

/// Shared services every viewset needs.
pub struct ApiEnv {
    pub db: DatabaseConnection,
    pub custom_fields: Arc<dyn CustomFieldStore>,
    pub export_templates: Arc<dyn ExportTemplateStore>,
    pub changes: Arc<dyn ChangeRecorder>,
    pub paging: Paging,
    /// Prefix for object URLs, e.g. `http://localhost:8087`. Empty renders
    /// root-relative URLs.
    pub base_url: String,
}

/// Router state for one viewset.
pub struct ViewSetState<V> {
    pub viewset: Arc<V>,
    pub env: Arc<ApiEnv>,
}

impl<V> Clone for ViewSetState<V> {
    fn clone(&self) -> Self {
        Self {
            viewset: Arc::clone(&self.viewset),
            env: Arc::clone(&self.env),
        }
    }
}

type ColumnOf<V> = <<V as ModelViewSet>::Entity as EntityTrait>::Column;

/// A REST resource backed by one sea-orm entity.
#[async_trait]
pub trait ModelViewSet: Send + Sync + 'static {
    type Entity: EntityTrait<Model = Self::Model>;
    type Model: ModelTrait<Entity = Self::Entity>
        + FromQueryResult
        + Clone
        + Send
        + Sync
        + 'static;
    /// Full representation.
    type Full: Serialize + Send + Sync;
    /// Write shape for create and full update (PUT).
    type Create: DeserializeOwned + Send;
    /// Write shape for partial update (PATCH).
    type Update: DeserializeOwned + Send + From<Self::Create>;

    fn content_type(&self) -> ContentType;

    /// Collection path with trailing slash, e.g. `/api/tenancy/tenants/`.
    fn base_path(&self) -> &'static str;

    fn verbose_name_plural(&self) -> &'static str;

    fn id_of(model: &Self::Model) -> i64;

    fn id_column() -> ColumnOf<Self>;

    /// Column an identity constraint attribute refers to. Attributes without
    /// a column match no rows.
    fn constraint_column(&self, attr: &str) -> Option<ColumnOf<Self>> {
        (attr == "id").then(Self::id_column)
    }

    /// Derived values computed at serialization time (counts).
    fn annotations(&self) -> &'static [&'static str] {
        &[]
    }

    /// Related data loaded at serialization time.
    fn prefetch_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Fields of the nested representation; `None` when the resource has none.
    fn brief_fields(&self) -> Option<&'static [&'static str]> {
        None
    }

    fn brief_prefetch_fields(&self) -> &'static [&'static str] {
        &[]
    }

    fn supports_custom_fields(&self) -> bool {
        false
    }

    /// Record pre/post snapshots in the change log on every write.
    fn change_logged(&self) -> bool {
        false
    }

    /// Base queryset with resource filters and ordering applied. Identity
    /// scope and id restriction are added by the caller.
    fn queryset(&self, filter: &ObjectFilter) -> ApiResult<Select<Self::Entity>>;

    async fn serialize<C: ConnectionTrait>(
        &self,
        conn: &C,
        rows: Vec<Self::Model>,
        ctx: &SerializerContext,
    ) -> ApiResult<Vec<Self::Full>>;

    /// Validate and insert one object.
    async fn perform_create(
        &self,
        txn: &DatabaseTransaction,
        data: Self::Create,
        ctx: &SerializerContext,
    ) -> ApiResult<Self::Model>;

    /// Validate and apply `data` to `current`.
    async fn perform_update(
        &self,
        txn: &DatabaseTransaction,
        current: Self::Model,
        data: Self::Update,
        ctx: &SerializerContext,
    ) -> ApiResult<Self::Model>;

    async fn perform_destroy(
        &self,
        txn: &DatabaseTransaction,
        current: Self::Model,
        ctx: &SerializerContext,
    ) -> ApiResult<()>;

    /// Human readable label stored in the change log.
    fn display(&self, model: &Self::Model) -> String;
}

/// Serialize rows as JSON values, brief or full according to `ctx.plan`.
pub async fn represent<V, C>(
    vs: &V,
    conn: &C,
    rows: Vec<V::Model>,
    ctx: &SerializerContext,
) -> ApiResult<Vec<Value>>
where
    V: ModelViewSet,
    C: ConnectionTrait,
{
    let full = vs.serialize(conn, rows, ctx).await?;
    let brief = if ctx.plan.brief {
        vs.brief_fields()
    } else {
        None
    };

    full.into_iter()
        .map(|item| {
            let value = serde_json::to_value(item)
                .map_err(|e| ApiError::Internal(format!("serialization failed: {e}")))?;
            Ok(match brief {
                Some(fields) => brief::project(value, fields),
                None => value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_label() {
        let ct = ContentType::new("tenancy", "tenantgroup");
        assert_eq!(ct.label(), "tenancy.tenantgroup");
        assert_eq!(ct.to_string(), "tenancy.tenantgroup");
    }

    #[test]
    fn object_urls() {
        let ctx = SerializerContext {
            base_url: "http://localhost:8087".into(),
            ..Default::default()
        };
        assert_eq!(
            ctx.url("/api/tenancy/tenants/", 4),
            "http://localhost:8087/api/tenancy/tenants/4/"
        );
    }
}
