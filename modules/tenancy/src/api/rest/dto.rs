use chrono::{DateTime, Utc};
use extras::NestedTag;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use modkit::viewset::{deserialize_some, RelatedRef};

/// Group as embedded in tenants and child groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedTenantGroup {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub slug: String,
    #[serde(rename = "_depth")]
    pub depth: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantDto {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub slug: String,
    pub group: Option<NestedTenantGroup>,
    pub description: String,
    pub comments: String,
    pub tags: Vec<NestedTag>,
    pub custom_fields: Value,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub circuit_count: u64,
    pub device_count: u64,
    pub ipaddress_count: u64,
    pub prefix_count: u64,
    pub rack_count: u64,
    pub site_count: u64,
    pub virtualmachine_count: u64,
    pub vlan_count: u64,
    pub vrf_count: u64,
    pub cluster_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantCreate {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub group: Option<RelatedRef>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<RelatedRef>>,
    #[serde(default)]
    pub custom_fields: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub group: Option<Option<RelatedRef>>,
    pub description: Option<String>,
    pub comments: Option<String>,
    pub tags: Option<Vec<RelatedRef>>,
    pub custom_fields: Option<Map<String, Value>>,
}

impl From<TenantCreate> for TenantUpdate {
    fn from(c: TenantCreate) -> Self {
        Self {
            name: Some(c.name),
            slug: Some(c.slug),
            group: Some(c.group),
            description: Some(c.description.unwrap_or_default()),
            comments: Some(c.comments.unwrap_or_default()),
            tags: Some(c.tags.unwrap_or_default()),
            custom_fields: c.custom_fields,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantGroupDto {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub slug: String,
    pub parent: Option<NestedTenantGroup>,
    pub description: String,
    pub custom_fields: Value,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub tenant_count: u64,
    #[serde(rename = "_depth")]
    pub depth: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantGroupCreate {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub parent: Option<RelatedRef>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub custom_fields: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantGroupUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub parent: Option<Option<RelatedRef>>,
    pub description: Option<String>,
    pub custom_fields: Option<Map<String, Value>>,
}

impl From<TenantGroupCreate> for TenantGroupUpdate {
    fn from(c: TenantGroupCreate) -> Self {
        Self {
            name: Some(c.name),
            slug: Some(c.slug),
            parent: Some(c.parent),
            description: Some(c.description.unwrap_or_default()),
            custom_fields: c.custom_fields,
        }
    }
}
