use std::sync::Arc;

use async_trait::async_trait;
use modkit::viewset::ApiEnv;
use modkit::{DbModule, RestfulModule};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::api::rest::routes;
use crate::domain::relations::{NoRelations, TenantRelations};
use crate::infra::storage::migrations::Migrator;

/// Tenants and tenant groups.
#[derive(Clone)]
pub struct Tenancy {
    relations: Arc<dyn TenantRelations>,
}

impl Default for Tenancy {
    fn default() -> Self {
        Self {
            relations: Arc::new(NoRelations),
        }
    }
}

impl Tenancy {
    /// Source of the related object counts shown on tenants.
    pub fn with_relations(relations: Arc<dyn TenantRelations>) -> Self {
        Self { relations }
    }
}

#[async_trait]
impl DbModule for Tenancy {
    async fn migrate(&self, db: &DatabaseConnection) -> anyhow::Result<()> {
        info!("Running tenancy database migrations");
        Migrator::up(db, None).await?;
        info!("Tenancy database migrations completed successfully");
        Ok(())
    }
}

impl RestfulModule for Tenancy {
    fn register_rest(
        &self,
        router: axum::Router,
        env: &Arc<ApiEnv>,
    ) -> anyhow::Result<axum::Router> {
        info!("Registering tenancy REST routes");
        routes::register_routes(router, env, self.relations.clone())
    }
}
