use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use modkit::viewset::{deserialize_some, CustomFieldType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagDto {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub slug: String,
    pub color: String,
    pub description: String,
    pub tagged_items: u64,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagCreate {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
}

impl From<TagCreate> for TagUpdate {
    fn from(c: TagCreate) -> Self {
        Self {
            name: Some(c.name),
            slug: Some(c.slug),
            color: c.color,
            description: Some(c.description.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFieldDto {
    pub id: i64,
    pub url: String,
    pub content_types: Vec<String>,
    #[serde(rename = "type")]
    pub field_type: String,
    pub name: String,
    pub label: String,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
    pub choices: Vec<String>,
    pub weight: i32,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomFieldCreate {
    pub content_types: Vec<String>,
    #[serde(rename = "type")]
    pub field_type: CustomFieldType,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub weight: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomFieldUpdate {
    pub content_types: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub field_type: Option<CustomFieldType>,
    pub name: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub required: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub default: Option<Option<Value>>,
    pub choices: Option<Vec<String>>,
    pub weight: Option<i32>,
}

impl From<CustomFieldCreate> for CustomFieldUpdate {
    fn from(c: CustomFieldCreate) -> Self {
        Self {
            content_types: Some(c.content_types),
            field_type: Some(c.field_type),
            name: Some(c.name),
            label: Some(c.label.unwrap_or_default()),
            description: Some(c.description.unwrap_or_default()),
            required: Some(c.required.unwrap_or_default()),
            default: Some(c.default),
            choices: Some(c.choices.unwrap_or_default()),
            weight: c.weight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportTemplateDto {
    pub id: i64,
    pub url: String,
    pub content_type: String,
    pub name: String,
    pub description: String,
    pub template_code: String,
    pub mime_type: String,
    pub file_extension: String,
    pub as_attachment: bool,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportTemplateCreate {
    pub content_type: String,
    pub name: String,
    pub template_code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_extension: Option<String>,
    #[serde(default)]
    pub as_attachment: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportTemplateUpdate {
    pub content_type: Option<String>,
    pub name: Option<String>,
    pub template_code: Option<String>,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    pub file_extension: Option<String>,
    pub as_attachment: Option<bool>,
}

impl From<ExportTemplateCreate> for ExportTemplateUpdate {
    fn from(c: ExportTemplateCreate) -> Self {
        Self {
            content_type: Some(c.content_type),
            name: Some(c.name),
            template_code: Some(c.template_code),
            description: Some(c.description.unwrap_or_default()),
            mime_type: Some(c.mime_type.unwrap_or_default()),
            file_extension: Some(c.file_extension.unwrap_or_default()),
            as_attachment: c.as_attachment,
        }
    }
}

/// Change log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectChangeDto {
    pub id: i64,
    pub url: String,
    pub time: DateTime<Utc>,
    pub user_name: String,
    pub request_id: Option<String>,
    pub action: String,
    pub changed_object_type: String,
    pub changed_object_id: i64,
    pub object_repr: String,
    pub prechange_data: Option<Value>,
    pub postchange_data: Option<Value>,
}
