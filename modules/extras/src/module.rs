use std::sync::Arc;

use async_trait::async_trait;
use modkit::viewset::ApiEnv;
use modkit::{DbModule, RestfulModule};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::api::rest::routes;
use crate::infra::storage::migrations::Migrator;

/// Tags, custom fields, export templates and the change log.
#[derive(Debug, Default, Clone)]
pub struct Extras;

#[async_trait]
impl DbModule for Extras {
    async fn migrate(&self, db: &DatabaseConnection) -> anyhow::Result<()> {
        info!("Running extras database migrations");
        Migrator::up(db, None).await?;
        info!("Extras database migrations completed successfully");
        Ok(())
    }
}

impl RestfulModule for Extras {
    fn register_rest(
        &self,
        router: axum::Router,
        env: &Arc<ApiEnv>,
    ) -> anyhow::Result<axum::Router> {
        info!("Registering extras REST routes");
        routes::register_routes(router, env)
    }
}
