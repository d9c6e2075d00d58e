use std::collections::BTreeSet;

use sea_orm::{ConnectionTrait, PaginatorTrait};

use super::query::{scoped_queryset, ObjectFilter};
use super::ModelViewSet;
use crate::api::{ApiError, ApiResult, Identity};

/// Ensure a written object is still visible to the caller.
pub async fn validate_object<V, C>(
    vs: &V,
    conn: &C,
    identity: &Identity,
    model: &V::Model,
) -> ApiResult<()>
where
    V: ModelViewSet,
    C: ConnectionTrait,
{
    validate_ids(vs, conn, identity, [V::id_of(model)].into_iter().collect()).await
}

/// Ensure every written object is still visible to the caller.
pub async fn validate_objects<V, C>(
    vs: &V,
    conn: &C,
    identity: &Identity,
    models: &[V::Model],
) -> ApiResult<()>
where
    V: ModelViewSet,
    C: ConnectionTrait,
{
    validate_ids(vs, conn, identity, models.iter().map(V::id_of).collect()).await
}

async fn validate_ids<V, C>(
    vs: &V,
    conn: &C,
    identity: &Identity,
    ids: BTreeSet<i64>,
) -> ApiResult<()>
where
    V: ModelViewSet,
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(());
    }
    let expected = ids.len() as u64;
    let conforming = scoped_queryset(vs, identity, &ObjectFilter::by_ids(ids))?
        .count(conn)
        .await?;
    if conforming != expected {
        tracing::debug!(
            object_type = %vs.content_type(),
            expected,
            conforming,
            "written objects fall outside the caller's scope"
        );
        return Err(ApiError::ObjectDoesNotExist);
    }
    Ok(())
}
