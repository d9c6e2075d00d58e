//! Axum handlers shared by every viewset.
//!
//! Bodies are taken as raw bytes and decoded here so malformed JSON is
//! reported as a problem document like every other error.

use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, Method},
    response::{IntoResponse, Response},
};
use sea_orm::{PaginatorTrait, QuerySelect};
use serde_json::Value;

use super::brief::brief_requested;
use super::bulk;
use super::pagination::{links, Paginated};
use super::query::{scoped_queryset, ListParams};
use super::{represent, ModelViewSet, QueryPlan, SerializerContext, ViewSetState};
use crate::api::request_id::header as request_id_header;
use crate::api::response::{created_json, no_content, ok_json};
use crate::api::{ApiError, ApiResult, Identity};

type Pairs = Query<Vec<(String, String)>>;

/// Request facts every handler needs.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub identity: Identity,
    pub request_id: Option<String>,
    pub path: String,
    pub method: Method,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        let request_id = parts
            .headers
            .get(request_id_header())
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        Ok(Self {
            identity,
            request_id,
            path: parts.uri.path().to_string(),
            method: parts.method.clone(),
        })
    }
}

impl RequestMeta {
    pub fn fail(&self, err: ApiError) -> Response {
        let mut problem = err.to_problem(&self.path);
        problem.0.request_id = self.request_id.clone();
        problem.into_response()
    }

    fn respond(&self, result: ApiResult<Response>) -> Response {
        result.unwrap_or_else(|e| self.fail(e))
    }
}

async fn context<V: ModelViewSet>(
    st: &ViewSetState<V>,
    meta: &RequestMeta,
    plan: QueryPlan,
) -> ApiResult<SerializerContext> {
    let vs = st.viewset.as_ref();
    let custom_fields = if vs.supports_custom_fields() {
        st.env.custom_fields.definitions(&vs.content_type()).await?
    } else {
        Vec::new()
    };
    Ok(SerializerContext {
        identity: meta.identity.clone(),
        request_id: meta.request_id.clone(),
        base_url: st.env.base_url.clone(),
        plan,
        custom_fields,
    })
}

fn parse_body(body: &Bytes) -> ApiResult<Value> {
    if body.is_empty() {
        return Err(ApiError::invalid("", "No data provided."));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::invalid("", format!("JSON parse error - {e}")))
}

/// Detail route ids that are not integers cannot name an object.
fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse().map_err(|_| ApiError::not_found())
}

pub async fn list<V: ModelViewSet>(
    State(st): State<ViewSetState<V>>,
    meta: RequestMeta,
    Query(pairs): Pairs,
) -> Response {
    meta.respond(list_inner(&st, &meta, pairs).await)
}

async fn list_inner<V: ModelViewSet>(
    st: &ViewSetState<V>,
    meta: &RequestMeta,
    pairs: Vec<(String, String)>,
) -> ApiResult<Response> {
    let vs = st.viewset.as_ref();
    let params = ListParams::parse(pairs.clone())?;

    if let Some(name) = params.export.as_deref() {
        return export_list(st, meta, &params, name).await;
    }

    let brief = brief_requested(meta.method == Method::GET, params.brief.as_deref());
    let ctx = context(st, meta, QueryPlan::for_request(vs, brief)).await?;
    let db = &st.env.db;

    let select = scoped_queryset(vs, &meta.identity, &params.filter)?;
    let count = select.clone().count(db).await?;
    let limit = st.env.paging.window(params.limit);
    let rows = select.offset(params.offset).limit(limit).all(db).await?;
    let results = represent(vs, db, rows, &ctx).await?;

    let path = format!("{}{}", st.env.base_url, meta.path);
    let (next, previous) = links(&path, &pairs, count, limit, params.offset);
    Ok(ok_json(Paginated {
        count,
        next,
        previous,
        results,
    }))
}

async fn export_list<V: ModelViewSet>(
    st: &ViewSetState<V>,
    meta: &RequestMeta,
    params: &ListParams,
    name: &str,
) -> ApiResult<Response> {
    let vs = st.viewset.as_ref();
    let template = st
        .env
        .export_templates
        .find(&vs.content_type(), name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Export template '{name}' not found.")))?;

    let ctx = context(st, meta, QueryPlan::full(vs)).await?;
    let db = &st.env.db;
    let rows = scoped_queryset(vs, &meta.identity, &params.filter)?
        .all(db)
        .await?;
    let queryset = represent(vs, db, rows, &ctx).await?;
    let body = template.render(&queryset)?;
    tracing::debug!(template = %template.name, objects = queryset.len(), "rendered export");
    Ok(template.response(vs.verbose_name_plural(), body))
}

pub async fn create<V: ModelViewSet>(
    State(st): State<ViewSetState<V>>,
    meta: RequestMeta,
    body: Bytes,
) -> Response {
    let result = async {
        let body = parse_body(&body)?;
        let ctx = context(&st, &meta, QueryPlan::full(st.viewset.as_ref())).await?;
        let created = bulk::sequential_create(st.viewset.as_ref(), &st.env, &ctx, body).await?;
        Ok::<_, ApiError>(created_json(created))
    }
    .await;
    meta.respond(result)
}

async fn bulk_update_inner<V: ModelViewSet>(
    st: &ViewSetState<V>,
    meta: &RequestMeta,
    body: &Bytes,
    partial: bool,
) -> ApiResult<Response> {
    let body = parse_body(body)?;
    let ctx = context(st, meta, QueryPlan::full(st.viewset.as_ref())).await?;
    let updated = bulk::bulk_update(st.viewset.as_ref(), &st.env, &ctx, body, partial).await?;
    Ok(ok_json(updated))
}

pub async fn bulk_update<V: ModelViewSet>(
    State(st): State<ViewSetState<V>>,
    meta: RequestMeta,
    body: Bytes,
) -> Response {
    meta.respond(bulk_update_inner(&st, &meta, &body, false).await)
}

pub async fn bulk_partial_update<V: ModelViewSet>(
    State(st): State<ViewSetState<V>>,
    meta: RequestMeta,
    body: Bytes,
) -> Response {
    meta.respond(bulk_update_inner(&st, &meta, &body, true).await)
}

pub async fn bulk_destroy<V: ModelViewSet>(
    State(st): State<ViewSetState<V>>,
    meta: RequestMeta,
    body: Bytes,
) -> Response {
    let result = async {
        let body = parse_body(&body)?;
        let ctx = context(&st, &meta, QueryPlan::full(st.viewset.as_ref())).await?;
        bulk::bulk_destroy(st.viewset.as_ref(), &st.env, &ctx, body).await?;
        Ok::<_, ApiError>(no_content())
    }
    .await;
    meta.respond(result)
}

pub async fn retrieve<V: ModelViewSet>(
    State(st): State<ViewSetState<V>>,
    meta: RequestMeta,
    Path(id): Path<String>,
    Query(pairs): Pairs,
) -> Response {
    let result = async {
        let id = parse_id(&id)?;
        let vs = st.viewset.as_ref();
        let params = ListParams::parse(pairs)?;
        let brief = brief_requested(meta.method == Method::GET, params.brief.as_deref());
        let ctx = context(&st, &meta, QueryPlan::for_request(vs, brief)).await?;
        let model = bulk::get_visible(vs, &st.env.db, &ctx, id).await?;
        let mut reps = represent(vs, &st.env.db, vec![model], &ctx).await?;
        Ok::<_, ApiError>(ok_json(reps.pop().unwrap_or(Value::Null)))
    }
    .await;
    meta.respond(result)
}

async fn update_inner<V: ModelViewSet>(
    st: &ViewSetState<V>,
    meta: &RequestMeta,
    id: &str,
    body: &Bytes,
    partial: bool,
) -> ApiResult<Response> {
    let id = parse_id(id)?;
    let body = parse_body(body)?;
    let ctx = context(st, meta, QueryPlan::full(st.viewset.as_ref())).await?;
    let updated = bulk::update_one(st.viewset.as_ref(), &st.env, &ctx, id, body, partial).await?;
    Ok(ok_json(updated))
}

pub async fn update<V: ModelViewSet>(
    State(st): State<ViewSetState<V>>,
    meta: RequestMeta,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    meta.respond(update_inner(&st, &meta, &id, &body, false).await)
}

pub async fn partial_update<V: ModelViewSet>(
    State(st): State<ViewSetState<V>>,
    meta: RequestMeta,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    meta.respond(update_inner(&st, &meta, &id, &body, true).await)
}

pub async fn destroy<V: ModelViewSet>(
    State(st): State<ViewSetState<V>>,
    meta: RequestMeta,
    Path(id): Path<String>,
) -> Response {
    let result = async {
        let id = parse_id(&id)?;
        let ctx = context(&st, &meta, QueryPlan::full(st.viewset.as_ref())).await?;
        bulk::destroy_one(st.viewset.as_ref(), &st.env, &ctx, id).await?;
        Ok::<_, ApiError>(no_content())
    }
    .await;
    meta.respond(result)
}
