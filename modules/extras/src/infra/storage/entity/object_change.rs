use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "extras_object_changes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub time: DateTime<Utc>,
    pub user_name: String,
    pub request_id: Option<String>,
    pub action: String,
    pub changed_object_type: String,
    pub changed_object_id: i64,
    pub object_repr: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub prechange_data: Option<Json>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub postchange_data: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
