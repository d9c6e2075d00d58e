use std::sync::Arc;

use axum::Router;
use modkit::viewset::{viewset_router, ApiEnv};

use super::changelog;
use super::viewsets::{CustomFieldViewSet, ExportTemplateViewSet, TagViewSet};

pub fn register_routes(router: Router, env: &Arc<ApiEnv>) -> anyhow::Result<Router> {
    let router = router
        .merge(viewset_router(Arc::new(TagViewSet), env.clone()))
        .merge(viewset_router(Arc::new(CustomFieldViewSet), env.clone()))
        .merge(viewset_router(Arc::new(ExportTemplateViewSet), env.clone()))
        .merge(changelog::router(env.clone()));
    Ok(router)
}
