use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use sea_orm::DatabaseConnection;

use crate::viewset::ApiEnv;

/// Module owning database tables.
#[async_trait]
pub trait DbModule: Send + Sync {
    /// Runs BEFORE any route is served.
    async fn migrate(&self, db: &DatabaseConnection) -> anyhow::Result<()>;
}

/// Pure wiring; must be sync. Runs AFTER DB migrations.
pub trait RestfulModule: Send + Sync {
    fn register_rest(&self, router: Router, env: &Arc<ApiEnv>) -> anyhow::Result<Router>;
}
