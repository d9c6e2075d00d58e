//! Tag assignment helpers for tagged resources.

use std::collections::{BTreeSet, HashMap};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use modkit::api::{ApiError, ApiResult};
use modkit::viewset::{ContentType, RelatedRef, SerializerContext};

use crate::api::rest::viewsets::TAGS_PATH;
use crate::infra::storage::entity::{tag, tagged_item};

/// Tag as embedded in tagged objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedTag {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub slug: String,
    pub color: String,
}

impl NestedTag {
    pub fn from_model(m: &tag::Model, ctx: &SerializerContext) -> Self {
        Self {
            id: m.id,
            url: ctx.url(TAGS_PATH, m.id),
            name: m.name.clone(),
            slug: m.slug.clone(),
            color: m.color.clone(),
        }
    }
}

/// Resolve tag references (id, `{"slug": ..}` or `{"name": ..}`).
/// Errors point at `/tags`.
pub async fn resolve_tags<C: ConnectionTrait>(
    conn: &C,
    refs: &[RelatedRef],
) -> ApiResult<Vec<tag::Model>> {
    let mut out: Vec<tag::Model> = Vec::with_capacity(refs.len());
    for r in refs {
        let select = match r {
            RelatedRef::Id(id) => tag::Entity::find_by_id(*id),
            RelatedRef::Attrs(_) => {
                let mut select = tag::Entity::find();
                if let Some(slug) = r.attr("slug") {
                    select = select.filter(tag::Column::Slug.eq(slug));
                } else if let Some(name) = r.attr("name") {
                    select = select.filter(tag::Column::Name.eq(name));
                } else {
                    return Err(ApiError::field(
                        "tags",
                        "Related objects must be referenced by id, slug or name.",
                    ));
                }
                select
            }
        };
        let found = select.one(conn).await?.ok_or_else(|| {
            ApiError::field("tags", "Related object not found using the provided attributes.")
        })?;
        if !out.iter().any(|t| t.id == found.id) {
            out.push(found);
        }
    }
    Ok(out)
}

/// Replace the tags assigned to one object.
pub async fn set_tags(
    txn: &DatabaseTransaction,
    content_type: &ContentType,
    object_id: i64,
    tags: &[tag::Model],
) -> ApiResult<()> {
    clear_tags(txn, content_type, &[object_id]).await?;
    for t in tags {
        tagged_item::ActiveModel {
            tag_id: Set(t.id),
            object_type: Set(content_type.label()),
            object_id: Set(object_id),
            ..Default::default()
        }
        .insert(txn)
        .await?;
    }
    Ok(())
}

pub async fn clear_tags(
    txn: &DatabaseTransaction,
    content_type: &ContentType,
    object_ids: &[i64],
) -> ApiResult<()> {
    if object_ids.is_empty() {
        return Ok(());
    }
    tagged_item::Entity::delete_many()
        .filter(tagged_item::Column::ObjectType.eq(content_type.label()))
        .filter(tagged_item::Column::ObjectId.is_in(object_ids.iter().copied()))
        .exec(txn)
        .await?;
    Ok(())
}

/// Tags of many objects, ordered by tag name.
pub async fn tags_for<C: ConnectionTrait>(
    conn: &C,
    content_type: &ContentType,
    object_ids: &[i64],
    ctx: &SerializerContext,
) -> ApiResult<HashMap<i64, Vec<NestedTag>>> {
    let mut out: HashMap<i64, Vec<NestedTag>> = HashMap::new();
    if object_ids.is_empty() {
        return Ok(out);
    }
    let ids: BTreeSet<i64> = object_ids.iter().copied().collect();
    let rows = tagged_item::Entity::find()
        .find_also_related(tag::Entity)
        .filter(tagged_item::Column::ObjectType.eq(content_type.label()))
        .filter(tagged_item::Column::ObjectId.is_in(ids))
        .order_by_asc(tag::Column::Name)
        .all(conn)
        .await?;
    for (item, tag) in rows {
        if let Some(tag) = tag {
            out.entry(item.object_id)
                .or_default()
                .push(NestedTag::from_model(&tag, ctx));
        }
    }
    Ok(out)
}
