use std::sync::Arc;

use axum::{routing::get, Router};

use super::handlers;
use super::{ApiEnv, ModelViewSet, ViewSetState};

/// Collection and detail routes for one viewset:
///
/// | route | GET | POST | PUT | PATCH | DELETE |
/// |---|---|---|---|---|---|
/// | `{base}` | list / export | create (one or many) | bulk update | bulk partial update | bulk destroy |
/// | `{base}{id}/` | retrieve | | update | partial update | destroy |
pub fn viewset_router<V: ModelViewSet>(viewset: Arc<V>, env: Arc<ApiEnv>) -> Router {
    let base = viewset.base_path();
    let detail = format!("{base}{{id}}/");
    tracing::debug!(object_type = %viewset.content_type(), path = base, "registering viewset routes");

    Router::new()
        .route(
            base,
            get(handlers::list::<V>)
                .post(handlers::create::<V>)
                .put(handlers::bulk_update::<V>)
                .patch(handlers::bulk_partial_update::<V>)
                .delete(handlers::bulk_destroy::<V>),
        )
        .route(
            &detail,
            get(handlers::retrieve::<V>)
                .put(handlers::update::<V>)
                .patch(handlers::partial_update::<V>)
                .delete(handlers::destroy::<V>),
        )
        .with_state(ViewSetState { viewset, env })
}
