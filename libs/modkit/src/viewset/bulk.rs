//! Sequential create, bulk update and bulk destroy.
//!
//! Each operation runs its whole loop in one transaction. The transaction
//! is committed only after every element (and every conformance check)
//! succeeded; returning early drops it, which rolls it back.

use std::collections::HashMap;

use sea_orm::TransactionTrait;
use serde_json::{Map, Value};

use super::changes::{record_change, snapshot, ChangeAction};
use super::query::{scoped_queryset, ObjectFilter};
use super::validation::{validate_object, validate_objects};
use super::{represent, ApiEnv, ModelViewSet, SerializerContext};
use crate::api::{ApiError, ApiResult, ValidationError};

/// One element of a bulk update/destroy payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    /// Position in the request body.
    pub index: usize,
    pub id: i64,
    /// Remaining fields, `id` removed.
    pub data: Map<String, Value>,
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Validate `[{"id": N, ...}, ...]`, collecting every element error.
pub fn parse_bulk_payload(body: Value) -> ApiResult<Vec<BulkItem>> {
    let items = match body {
        Value::Array(items) => items,
        other => {
            return Err(ApiError::invalid(
                "",
                format!(
                    "Expected a list of items but got type \"{}\".",
                    type_name(&other)
                ),
            ))
        }
    };

    let mut errors = Vec::new();
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(mut data) = item else {
            errors.push(
                ValidationError::new("", "Expected a dictionary of items.").under_index(index),
            );
            continue;
        };
        match data.remove("id") {
            None | Some(Value::Null) => errors.push(
                ValidationError::field("id", "This field is required.").under_index(index),
            ),
            Some(raw) => match raw.as_i64() {
                Some(id) => out.push(BulkItem { index, id, data }),
                None => errors.push(
                    ValidationError::field("id", "A valid integer is required.")
                        .under_index(index),
                ),
            },
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// Collapse repeated ids: first-seen order, last-supplied data.
pub fn dedupe(items: Vec<BulkItem>) -> Vec<BulkItem> {
    let mut slot: HashMap<i64, usize> = HashMap::new();
    let mut out: Vec<BulkItem> = Vec::with_capacity(items.len());
    for item in items {
        match slot.get(&item.id) {
            Some(&pos) => out[pos] = item,
            None => {
                slot.insert(item.id, out.len());
                out.push(item);
            }
        }
    }
    out
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(ApiError::malformed)
}

/// POST with an object or an array. Array elements are created one at a
/// time in input order so each one observes the ones before it.
#[tracing::instrument(level = "debug", skip_all, fields(object_type = %vs.content_type()))]
pub async fn sequential_create<V: ModelViewSet>(
    vs: &V,
    env: &ApiEnv,
    ctx: &SerializerContext,
    body: Value,
) -> ApiResult<Value> {
    let (items, many) = match body {
        Value::Array(items) => (items, true),
        obj @ Value::Object(_) => (vec![obj], false),
        other => {
            return Err(ApiError::invalid(
                "",
                format!(
                    "Expected a dictionary or a list of items but got type \"{}\".",
                    type_name(&other)
                ),
            ))
        }
    };
    let at = |i: usize, e: ApiError| if many { e.at_index(i) } else { e };

    let mut payloads = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        payloads.push(decode::<V::Create>(item).map_err(|e| at(i, e))?);
    }

    let txn = env.db.begin().await?;
    let mut created = Vec::with_capacity(payloads.len());
    for (i, data) in payloads.into_iter().enumerate() {
        let model = vs
            .perform_create(&txn, data, ctx)
            .await
            .map_err(|e| at(i, e))?;
        record_change(
            vs,
            env.changes.as_ref(),
            &txn,
            ChangeAction::Create,
            &model,
            None,
            ctx,
        )
        .await?;
        created.push(model);
    }
    validate_objects(vs, &txn, &ctx.identity, &created).await?;

    let count = created.len();
    let mut reps = represent(vs, &txn, created, ctx).await?;
    txn.commit().await?;
    tracing::info!(count, "created objects");

    Ok(if many {
        Value::Array(reps)
    } else {
        reps.pop().unwrap_or(Value::Null)
    })
}

/// PUT/PATCH `[{"id": N, ...}]`. Ids outside the caller's queryset are
/// skipped; the rest are updated in input order.
#[tracing::instrument(level = "debug", skip_all, fields(object_type = %vs.content_type(), partial = partial))]
pub async fn bulk_update<V: ModelViewSet>(
    vs: &V,
    env: &ApiEnv,
    ctx: &SerializerContext,
    body: Value,
    partial: bool,
) -> ApiResult<Vec<Value>> {
    let items = dedupe(parse_bulk_payload(body)?);

    let mut updates = Vec::with_capacity(items.len());
    for item in items {
        let data = Value::Object(item.data);
        let update = if partial {
            decode::<V::Update>(data)
        } else {
            decode::<V::Create>(data).map(Into::into)
        }
        .map_err(|e| e.at_index(item.index))?;
        updates.push((item.index, item.id, update));
    }

    let txn = env.db.begin().await?;
    let mut updated = Vec::with_capacity(updates.len());
    for (index, id, data) in updates {
        // Earlier elements may have changed or removed this row.
        let Some(current) = find_visible(vs, &txn, ctx, id).await? else {
            tracing::debug!(id, "skipping id outside the queryset");
            continue;
        };
        let prechange = snapshot(vs, &txn, &current, ctx).await?;
        let model = vs
            .perform_update(&txn, current, data, ctx)
            .await
            .map_err(|e| e.at_index(index))?;
        record_change(
            vs,
            env.changes.as_ref(),
            &txn,
            ChangeAction::Update,
            &model,
            prechange,
            ctx,
        )
        .await?;
        validate_object(vs, &txn, &ctx.identity, &model).await?;
        updated.push(model);
    }

    let count = updated.len();
    let reps = represent(vs, &txn, updated, ctx).await?;
    txn.commit().await?;
    tracing::info!(count, "updated objects");
    Ok(reps)
}

/// DELETE `[{"id": N}, ...]`.
#[tracing::instrument(level = "debug", skip_all, fields(object_type = %vs.content_type()))]
pub async fn bulk_destroy<V: ModelViewSet>(
    vs: &V,
    env: &ApiEnv,
    ctx: &SerializerContext,
    body: Value,
) -> ApiResult<()> {
    let items = dedupe(parse_bulk_payload(body)?);

    let txn = env.db.begin().await?;
    let mut count = 0usize;
    for item in items {
        // Gone once an earlier element cascaded onto it.
        let Some(current) = find_visible(vs, &txn, ctx, item.id).await? else {
            tracing::debug!(id = item.id, "skipping id outside the queryset");
            continue;
        };
        destroy_in(vs, env, &txn, current, ctx).await?;
        count += 1;
    }

    txn.commit().await?;
    tracing::info!(count, "deleted objects");
    Ok(())
}

/// Snapshot, delete and log one object inside an open transaction.
pub(crate) async fn destroy_in<V: ModelViewSet>(
    vs: &V,
    env: &ApiEnv,
    txn: &sea_orm::DatabaseTransaction,
    current: V::Model,
    ctx: &SerializerContext,
) -> ApiResult<()> {
    let prechange = snapshot(vs, txn, &current, ctx).await?;
    vs.perform_destroy(txn, current.clone(), ctx).await?;
    record_change(
        vs,
        env.changes.as_ref(),
        txn,
        ChangeAction::Delete,
        &current,
        prechange,
        ctx,
    )
    .await
}

/// Current row for `id` as seen through the caller's queryset.
async fn find_visible<V, C>(
    vs: &V,
    conn: &C,
    ctx: &SerializerContext,
    id: i64,
) -> ApiResult<Option<V::Model>>
where
    V: ModelViewSet,
    C: sea_orm::ConnectionTrait,
{
    Ok(scoped_queryset(vs, &ctx.identity, &ObjectFilter::by_ids([id]))?
        .one(conn)
        .await?)
}

/// Fetch one object through the caller's queryset.
pub(crate) async fn get_visible<V, C>(
    vs: &V,
    conn: &C,
    ctx: &SerializerContext,
    id: i64,
) -> ApiResult<V::Model>
where
    V: ModelViewSet,
    C: sea_orm::ConnectionTrait,
{
    find_visible(vs, conn, ctx, id)
        .await?
        .ok_or_else(ApiError::not_found)
}

/// PUT/PATCH on a detail route.
pub(crate) async fn update_one<V: ModelViewSet>(
    vs: &V,
    env: &ApiEnv,
    ctx: &SerializerContext,
    id: i64,
    body: Value,
    partial: bool,
) -> ApiResult<Value> {
    let data = if partial {
        decode::<V::Update>(body)?
    } else {
        decode::<V::Create>(body)?.into()
    };

    let txn = env.db.begin().await?;
    let current = get_visible(vs, &txn, ctx, id).await?;
    let prechange = snapshot(vs, &txn, &current, ctx).await?;
    let model = vs.perform_update(&txn, current, data, ctx).await?;
    record_change(
        vs,
        env.changes.as_ref(),
        &txn,
        ChangeAction::Update,
        &model,
        prechange,
        ctx,
    )
    .await?;
    validate_object(vs, &txn, &ctx.identity, &model).await?;
    let mut reps = represent(vs, &txn, vec![model], ctx).await?;
    txn.commit().await?;
    Ok(reps.pop().unwrap_or(Value::Null))
}

/// DELETE on a detail route.
pub(crate) async fn destroy_one<V: ModelViewSet>(
    vs: &V,
    env: &ApiEnv,
    ctx: &SerializerContext,
    id: i64,
) -> ApiResult<()> {
    let txn = env.db.begin().await?;
    let current = get_visible(vs, &txn, ctx, id).await?;
    destroy_in(vs, env, &txn, current, ctx).await?;
    txn.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_errors_are_collected_per_element() {
        let err = parse_bulk_payload(json!([{"id": 1}, {"name": "x"}, {"id": "a"}, 4]))
            .unwrap_err();
        match err {
            ApiError::Validation(errs) => {
                let pointers: Vec<_> = errs.iter().map(|e| e.pointer.as_str()).collect();
                assert_eq!(pointers, ["/1/id", "/2/id", "/3"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn payload_must_be_a_list() {
        assert!(parse_bulk_payload(json!({"id": 1})).is_err());
    }

    #[test]
    fn id_is_split_from_data() {
        let items = parse_bulk_payload(json!([{"id": 3, "name": "a"}])).unwrap();
        assert_eq!(items[0].id, 3);
        assert_eq!(Value::Object(items[0].data.clone()), json!({"name": "a"}));
    }

    #[test]
    fn duplicates_keep_first_position_and_last_data() {
        let items = parse_bulk_payload(json!([
            {"id": 2, "name": "first"},
            {"id": 1, "name": "one"},
            {"id": 2, "name": "last"}
        ]))
        .unwrap();
        let items = dedupe(items);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 2);
        assert_eq!(items[0].index, 2);
        assert_eq!(items[0].data["name"], "last");
        assert_eq!(items[1].id, 1);
    }
}
