use std::sync::Arc;

use axum::Router;
use modkit::viewset::{viewset_router, ApiEnv};

use super::viewsets::{TenantGroupViewSet, TenantViewSet};
use crate::domain::relations::TenantRelations;

pub fn register_routes(
    router: Router,
    env: &Arc<ApiEnv>,
    relations: Arc<dyn TenantRelations>,
) -> anyhow::Result<Router> {
    let router = router
        .merge(viewset_router(
            Arc::new(TenantViewSet::new(relations)),
            env.clone(),
        ))
        .merge(viewset_router(Arc::new(TenantGroupViewSet), env.clone()));
    Ok(router)
}
