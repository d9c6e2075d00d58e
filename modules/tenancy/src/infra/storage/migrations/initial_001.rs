use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum TenancyTenantGroups {
    Table,
    Id,
    Name,
    Slug,
    ParentId,
    Depth,
    Description,
    CustomFieldData,
    Created,
    LastUpdated,
}

#[derive(DeriveIden)]
enum TenancyTenants {
    Table,
    Id,
    Name,
    Slug,
    GroupId,
    Description,
    Comments,
    CustomFieldData,
    Created,
    LastUpdated,
}

fn id_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn timestamp<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TenancyTenantGroups::Table)
                    .if_not_exists()
                    .col(id_col(TenancyTenantGroups::Id))
                    .col(ColumnDef::new(TenancyTenantGroups::Name).string_len(100).not_null().unique_key())
                    .col(ColumnDef::new(TenancyTenantGroups::Slug).string_len(100).not_null().unique_key())
                    .col(ColumnDef::new(TenancyTenantGroups::ParentId).big_integer().null())
                    .col(ColumnDef::new(TenancyTenantGroups::Depth).integer().not_null().default(0))
                    .col(ColumnDef::new(TenancyTenantGroups::Description).string_len(200).not_null().default(""))
                    .col(ColumnDef::new(TenancyTenantGroups::CustomFieldData).json_binary().not_null())
                    .col(timestamp(TenancyTenantGroups::Created))
                    .col(timestamp(TenancyTenantGroups::LastUpdated))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tenant_groups_parent")
                            .from(TenancyTenantGroups::Table, TenancyTenantGroups::ParentId)
                            .to(TenancyTenantGroups::Table, TenancyTenantGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_tenant_groups_parent")
                    .table(TenancyTenantGroups::Table)
                    .col(TenancyTenantGroups::ParentId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TenancyTenants::Table)
                    .if_not_exists()
                    .col(id_col(TenancyTenants::Id))
                    .col(ColumnDef::new(TenancyTenants::Name).string_len(100).not_null().unique_key())
                    .col(ColumnDef::new(TenancyTenants::Slug).string_len(100).not_null().unique_key())
                    .col(ColumnDef::new(TenancyTenants::GroupId).big_integer().null())
                    .col(ColumnDef::new(TenancyTenants::Description).string_len(200).not_null().default(""))
                    .col(ColumnDef::new(TenancyTenants::Comments).text().not_null().default(""))
                    .col(ColumnDef::new(TenancyTenants::CustomFieldData).json_binary().not_null())
                    .col(timestamp(TenancyTenants::Created))
                    .col(timestamp(TenancyTenants::LastUpdated))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tenants_group")
                            .from(TenancyTenants::Table, TenancyTenants::GroupId)
                            .to(TenancyTenantGroups::Table, TenancyTenantGroups::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_tenants_group")
                    .table(TenancyTenants::Table)
                    .col(TenancyTenants::GroupId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TenancyTenants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TenancyTenantGroups::Table).to_owned())
            .await
    }
}
