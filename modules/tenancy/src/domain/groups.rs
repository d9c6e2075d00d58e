//! Tenant group tree maintenance.

use std::collections::{HashMap, VecDeque};

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect,
};
use sea_orm::sea_query::Expr;

use modkit::api::{ApiError, ApiResult};
use modkit::viewset::RelatedRef;

use crate::infra::storage::entity::{tenant, tenant_group};

/// Look up a group by id, slug or name. Errors point at `field`.
pub async fn resolve_group<C: ConnectionTrait>(
    conn: &C,
    field: &str,
    r: &RelatedRef,
) -> ApiResult<tenant_group::Model> {
    let select = match r {
        RelatedRef::Id(id) => tenant_group::Entity::find_by_id(*id),
        RelatedRef::Attrs(_) => {
            let select = tenant_group::Entity::find();
            if let Some(slug) = r.attr("slug") {
                select.filter(tenant_group::Column::Slug.eq(slug))
            } else if let Some(name) = r.attr("name") {
                select.filter(tenant_group::Column::Name.eq(name))
            } else {
                return Err(ApiError::field(
                    field,
                    "Related objects must be referenced by id, slug or name.",
                ));
            }
        }
    };
    select.one(conn).await?.ok_or_else(|| {
        ApiError::field(field, "Related object not found using the provided attributes.")
    })
}

/// `parent id -> child ids` for the whole forest.
pub async fn children_map<C: ConnectionTrait>(conn: &C) -> ApiResult<HashMap<i64, Vec<i64>>> {
    let pairs: Vec<(i64, Option<i64>)> = tenant_group::Entity::find()
        .select_only()
        .column(tenant_group::Column::Id)
        .column(tenant_group::Column::ParentId)
        .into_tuple()
        .all(conn)
        .await?;
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for (id, parent) in pairs {
        if let Some(parent) = parent {
            children.entry(parent).or_default().push(id);
        }
    }
    Ok(children)
}

/// Every group below `root`, breadth first, `root` excluded.
pub fn descendants(children: &HashMap<i64, Vec<i64>>, root: i64) -> Vec<i64> {
    let mut out = Vec::new();
    let mut queue: VecDeque<i64> = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        for child in children.get(&id).into_iter().flatten() {
            // a corrupt cycle must not spin forever
            if *child != root && !out.contains(child) {
                out.push(*child);
                queue.push_back(*child);
            }
        }
    }
    out
}

/// Reject a parent that is the group itself or one of its descendants.
pub async fn check_parent<C: ConnectionTrait>(
    conn: &C,
    group_id: i64,
    parent_id: i64,
) -> ApiResult<()> {
    if parent_id == group_id {
        return Err(ApiError::field("parent", "Cannot assign self or child as parent."));
    }
    let children = children_map(conn).await?;
    if descendants(&children, group_id).contains(&parent_id) {
        return Err(ApiError::field("parent", "Cannot assign self or child as parent."));
    }
    Ok(())
}

/// Recompute `depth` below `root`, whose own depth is `root_depth`.
pub async fn resync_depths(
    txn: &DatabaseTransaction,
    root: i64,
    root_depth: i32,
) -> ApiResult<()> {
    let children = children_map(txn).await?;
    let mut queue: VecDeque<(i64, i32)> = VecDeque::from([(root, root_depth)]);
    let mut seen = vec![root];
    while let Some((id, depth)) = queue.pop_front() {
        let kids: Vec<i64> = children
            .get(&id)
            .into_iter()
            .flatten()
            .copied()
            .filter(|c| !seen.contains(c))
            .collect();
        if kids.is_empty() {
            continue;
        }
        tenant_group::Entity::update_many()
            .col_expr(tenant_group::Column::Depth, Expr::value(depth + 1))
            .filter(tenant_group::Column::Id.is_in(kids.iter().copied()))
            .exec(txn)
            .await?;
        for kid in kids {
            seen.push(kid);
            queue.push_back((kid, depth + 1));
        }
    }
    Ok(())
}

/// Delete `root` and its whole subtree, detaching their tenants.
/// Returns the ids removed besides `root`.
pub async fn delete_subtree(txn: &DatabaseTransaction, root: i64) -> ApiResult<Vec<i64>> {
    let children = children_map(txn).await?;
    let below = descendants(&children, root);
    let mut all = below.clone();
    all.push(root);

    tenant::Entity::update_many()
        .col_expr(tenant::Column::GroupId, Expr::value(Option::<i64>::None))
        .filter(tenant::Column::GroupId.is_in(all.iter().copied()))
        .exec(txn)
        .await?;
    tenant_group::Entity::delete_many()
        .filter(tenant_group::Column::Id.is_in(all))
        .exec(txn)
        .await?;
    Ok(below)
}

/// Tenants per group, each group counting its whole subtree.
pub async fn cumulative_tenant_counts<C: ConnectionTrait>(
    conn: &C,
    group_ids: &[i64],
) -> ApiResult<HashMap<i64, u64>> {
    if group_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let children = children_map(conn).await?;
    let mut subtrees: HashMap<i64, Vec<i64>> = HashMap::with_capacity(group_ids.len());
    let mut every: Vec<i64> = Vec::new();
    for &id in group_ids {
        let mut members = descendants(&children, id);
        members.push(id);
        every.extend(members.iter().copied());
        subtrees.insert(id, members);
    }
    every.sort_unstable();
    every.dedup();

    let direct = modkit::viewset::query::count_by::<tenant::Entity, _>(
        conn,
        tenant::Column::GroupId,
        &every,
    )
    .await?;
    Ok(subtrees
        .into_iter()
        .map(|(id, members)| {
            let n = members.iter().filter_map(|m| direct.get(m)).sum();
            (id, n)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descendants_walks_breadth_first() {
        let children = HashMap::from([(1, vec![2, 3]), (2, vec![4]), (4, vec![5])]);
        assert_eq!(descendants(&children, 1), vec![2, 3, 4, 5]);
        assert_eq!(descendants(&children, 4), vec![5]);
        assert!(descendants(&children, 3).is_empty());
    }

    #[test]
    fn descendants_stops_on_cycles() {
        let children = HashMap::from([(1, vec![2]), (2, vec![1])]);
        assert_eq!(descendants(&children, 1), vec![2]);
    }
}
