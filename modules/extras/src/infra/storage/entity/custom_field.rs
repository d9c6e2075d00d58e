use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "extras_custom_fields")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub name: String,
    pub label: String,
    /// Comma-delimited object type labels, with leading and trailing
    /// commas: `,tenancy.tenant,tenancy.tenantgroup,`.
    pub object_types: String,
    pub field_type: String,
    pub required: bool,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub default: Option<Json>,
    #[sea_orm(column_type = "JsonBinary")]
    pub choices: Json,
    pub description: String,
    pub weight: i32,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn object_type_list(&self) -> Vec<String> {
        split_object_types(&self.object_types)
    }
}

pub fn join_object_types(labels: &[String]) -> String {
    format!(",{},", labels.join(","))
}

pub fn split_object_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// LIKE pattern matching one label in the delimited column.
pub fn object_type_pattern(label: &str) -> String {
    format!("%,{label},%")
}
