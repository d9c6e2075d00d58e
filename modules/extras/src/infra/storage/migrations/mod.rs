use sea_orm_migration::prelude::*;

mod initial_001;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(initial_001::Migration)]
    }

    /// Each module tracks its own migrations.
    fn migration_table_name() -> DynIden {
        Alias::new("seaql_migrations_extras").into_iden()
    }
}
