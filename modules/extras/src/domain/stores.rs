//! Database-backed implementations of the viewset service ports.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

use modkit::api::{ApiError, ApiResult};
use modkit::viewset::{
    ChangeRecorder, ContentType, CustomFieldDefinition, CustomFieldStore, CustomFieldType,
    ExportTemplate, ExportTemplateStore, ObjectChange,
};

use crate::infra::storage::entity::{custom_field, export_template, object_change};

pub fn parse_field_type(raw: &str) -> Option<CustomFieldType> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).ok()
}

pub(crate) fn to_definition(m: custom_field::Model) -> ApiResult<CustomFieldDefinition> {
    let field_type = parse_field_type(&m.field_type).ok_or_else(|| {
        ApiError::Internal(format!(
            "custom field {} has unknown type {}",
            m.name, m.field_type
        ))
    })?;
    let choices: Vec<String> = serde_json::from_value(m.choices)
        .map_err(|e| ApiError::Internal(format!("custom field {} choices: {e}", m.name)))?;
    Ok(CustomFieldDefinition {
        name: m.name,
        field_type,
        required: m.required,
        default: m.default.filter(|d| !d.is_null()),
        choices,
        weight: m.weight,
    })
}

pub struct DbCustomFieldStore {
    db: DatabaseConnection,
}

impl DbCustomFieldStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CustomFieldStore for DbCustomFieldStore {
    async fn definitions(
        &self,
        content_type: &ContentType,
    ) -> ApiResult<Vec<CustomFieldDefinition>> {
        let pattern = custom_field::object_type_pattern(&content_type.label());
        custom_field::Entity::find()
            .filter(custom_field::Column::ObjectTypes.like(pattern))
            .order_by_asc(custom_field::Column::Weight)
            .order_by_asc(custom_field::Column::Name)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_definition)
            .collect()
    }
}

pub struct DbExportTemplateStore {
    db: DatabaseConnection,
}

impl DbExportTemplateStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ExportTemplateStore for DbExportTemplateStore {
    async fn find(
        &self,
        content_type: &ContentType,
        name: &str,
    ) -> ApiResult<Option<ExportTemplate>> {
        let found = export_template::Entity::find()
            .filter(export_template::Column::ObjectType.eq(content_type.label()))
            .filter(export_template::Column::Name.eq(name))
            .one(&self.db)
            .await?;
        Ok(found.map(|m| ExportTemplate {
            name: m.name,
            template_code: m.template_code,
            mime_type: m.mime_type,
            file_extension: m.file_extension,
            as_attachment: m.as_attachment,
        }))
    }
}

/// Writes change log rows inside the caller's transaction.
pub struct DbChangeRecorder;

#[async_trait]
impl ChangeRecorder for DbChangeRecorder {
    async fn record(&self, txn: &DatabaseTransaction, change: ObjectChange) -> ApiResult<()> {
        let mut repr = change.object_repr;
        if repr.chars().count() > 200 {
            repr = repr.chars().take(200).collect();
        }
        object_change::ActiveModel {
            time: Set(Utc::now()),
            user_name: Set(change.user_name),
            request_id: Set(change.request_id),
            action: Set(change.action.as_str().to_string()),
            changed_object_type: Set(change.object_type),
            changed_object_id: Set(change.object_id),
            object_repr: Set(repr),
            prechange_data: Set(change.prechange_data),
            postchange_data: Set(change.postchange_data),
            ..Default::default()
        }
        .insert(txn)
        .await?;
        Ok(())
    }
}
