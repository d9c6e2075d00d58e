//! Read-only object change log.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Router,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};

use modkit::api::response::ok_json;
use modkit::api::{ApiError, ApiResult};
use modkit::viewset::handlers::RequestMeta;
use modkit::viewset::pagination::links;
use modkit::viewset::{ApiEnv, ListParams, Paginated};

use super::dto::ObjectChangeDto;
use crate::infra::storage::entity::object_change;

pub const OBJECT_CHANGES_PATH: &str = "/api/extras/object-changes/";

pub fn router(env: Arc<ApiEnv>) -> Router {
    Router::new()
        .route(OBJECT_CHANGES_PATH, get(list))
        .route(&format!("{OBJECT_CHANGES_PATH}{{id}}/"), get(retrieve))
        .with_state(env)
}

fn to_dto(env: &ApiEnv, m: object_change::Model) -> ObjectChangeDto {
    ObjectChangeDto {
        url: format!("{}{}{}/", env.base_url, OBJECT_CHANGES_PATH, m.id),
        id: m.id,
        time: m.time,
        user_name: m.user_name,
        request_id: m.request_id,
        action: m.action,
        changed_object_type: m.changed_object_type,
        changed_object_id: m.changed_object_id,
        object_repr: m.object_repr,
        prechange_data: m.prechange_data,
        postchange_data: m.postchange_data,
    }
}

async fn list(
    State(env): State<Arc<ApiEnv>>,
    meta: RequestMeta,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    match list_inner(&env, &meta, pairs).await {
        Ok(resp) => resp,
        Err(e) => meta.fail(e),
    }
}

async fn list_inner(
    env: &ApiEnv,
    meta: &RequestMeta,
    pairs: Vec<(String, String)>,
) -> ApiResult<Response> {
    let params = ListParams::parse(pairs.clone())?;
    let filter = &params.filter;

    let mut select = object_change::Entity::find();
    if let Some(ids) = &filter.ids {
        select = select.filter(object_change::Column::Id.is_in(ids.iter().copied()));
    }
    let types = filter.values("changed_object_type");
    if !types.is_empty() {
        select = select.filter(object_change::Column::ChangedObjectType.is_in(types.iter().cloned()));
    }
    let (object_ids, _) = filter.ids_or_null("changed_object_id")?;
    if !object_ids.is_empty() {
        select = select.filter(object_change::Column::ChangedObjectId.is_in(object_ids));
    }
    let actions = filter.values("action");
    if !actions.is_empty() {
        select = select.filter(object_change::Column::Action.is_in(actions.iter().cloned()));
    }
    let users = filter.values("user_name");
    if !users.is_empty() {
        select = select.filter(object_change::Column::UserName.is_in(users.iter().cloned()));
    }
    if let Some(request_id) = filter.first("request_id") {
        select = select.filter(object_change::Column::RequestId.eq(request_id));
    }

    let count = select.clone().count(&env.db).await?;
    let limit = env.paging.window(params.limit);
    let rows = select
        .order_by_desc(object_change::Column::Id)
        .offset(params.offset)
        .limit(limit)
        .all(&env.db)
        .await?;

    let path = format!("{}{}", env.base_url, meta.path);
    let (next, previous) = links(&path, &pairs, count, limit, params.offset);
    Ok(ok_json(Paginated {
        count,
        next,
        previous,
        results: rows.into_iter().map(|m| to_dto(env, m)).collect(),
    }))
}

async fn retrieve(
    State(env): State<Arc<ApiEnv>>,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> Response {
    let result = async {
        let id: i64 = id.parse().map_err(|_| ApiError::not_found())?;
        let found = object_change::Entity::find_by_id(id)
            .one(&env.db)
            .await?
            .ok_or_else(ApiError::not_found)?;
        Ok::<_, ApiError>(ok_json(to_dto(&env, found)))
    }
    .await;
    result.unwrap_or_else(|e| meta.fail(e))
}
