use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum ExtrasTags {
    Table,
    Id,
    Name,
    Slug,
    Color,
    Description,
    Created,
    LastUpdated,
}

#[derive(DeriveIden)]
enum ExtrasTaggedItems {
    Table,
    Id,
    TagId,
    ObjectType,
    ObjectId,
}

#[derive(DeriveIden)]
enum ExtrasCustomFields {
    Table,
    Id,
    Name,
    Label,
    ObjectTypes,
    FieldType,
    Required,
    Default,
    Choices,
    Description,
    Weight,
    Created,
    LastUpdated,
}

#[derive(DeriveIden)]
enum ExtrasExportTemplates {
    Table,
    Id,
    ObjectType,
    Name,
    Description,
    TemplateCode,
    MimeType,
    FileExtension,
    AsAttachment,
    Created,
    LastUpdated,
}

#[derive(DeriveIden)]
enum ExtrasObjectChanges {
    Table,
    Id,
    Time,
    UserName,
    RequestId,
    Action,
    ChangedObjectType,
    ChangedObjectId,
    ObjectRepr,
    PrechangeData,
    PostchangeData,
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
                    .table(ExtrasTags::Table)
                    .if_not_exists()
                    .col(id_col(ExtrasTags::Id))
                    .col(ColumnDef::new(ExtrasTags::Name).string_len(100).not_null().unique_key())
                    .col(ColumnDef::new(ExtrasTags::Slug).string_len(100).not_null().unique_key())
                    .col(ColumnDef::new(ExtrasTags::Color).string_len(6).not_null())
                    .col(ColumnDef::new(ExtrasTags::Description).string_len(200).not_null().default(""))
                    .col(timestamp(ExtrasTags::Created))
                    .col(timestamp(ExtrasTags::LastUpdated))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExtrasTaggedItems::Table)
                    .if_not_exists()
                    .col(id_col(ExtrasTaggedItems::Id))
                    .col(ColumnDef::new(ExtrasTaggedItems::TagId).big_integer().not_null())
                    .col(ColumnDef::new(ExtrasTaggedItems::ObjectType).string_len(100).not_null())
                    .col(ColumnDef::new(ExtrasTaggedItems::ObjectId).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tagged_items_tag")
                            .from(ExtrasTaggedItems::Table, ExtrasTaggedItems::TagId)
                            .to(ExtrasTags::Table, ExtrasTags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_tagged_items_assignment")
                    .table(ExtrasTaggedItems::Table)
                    .col(ExtrasTaggedItems::TagId)
                    .col(ExtrasTaggedItems::ObjectType)
                    .col(ExtrasTaggedItems::ObjectId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExtrasCustomFields::Table)
                    .if_not_exists()
                    .col(id_col(ExtrasCustomFields::Id))
                    .col(ColumnDef::new(ExtrasCustomFields::Name).string_len(50).not_null().unique_key())
                    .col(ColumnDef::new(ExtrasCustomFields::Label).string_len(50).not_null().default(""))
                    .col(ColumnDef::new(ExtrasCustomFields::ObjectTypes).text().not_null())
                    .col(ColumnDef::new(ExtrasCustomFields::FieldType).string_len(50).not_null())
                    .col(ColumnDef::new(ExtrasCustomFields::Required).boolean().not_null().default(false))
                    .col(ColumnDef::new(ExtrasCustomFields::Default).json_binary().null())
                    .col(ColumnDef::new(ExtrasCustomFields::Choices).json_binary().not_null())
                    .col(ColumnDef::new(ExtrasCustomFields::Description).string_len(200).not_null().default(""))
                    .col(ColumnDef::new(ExtrasCustomFields::Weight).integer().not_null().default(100))
                    .col(timestamp(ExtrasCustomFields::Created))
                    .col(timestamp(ExtrasCustomFields::LastUpdated))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExtrasExportTemplates::Table)
                    .if_not_exists()
                    .col(id_col(ExtrasExportTemplates::Id))
                    .col(ColumnDef::new(ExtrasExportTemplates::ObjectType).string_len(100).not_null())
                    .col(ColumnDef::new(ExtrasExportTemplates::Name).string_len(100).not_null())
                    .col(ColumnDef::new(ExtrasExportTemplates::Description).string_len(200).not_null().default(""))
                    .col(ColumnDef::new(ExtrasExportTemplates::TemplateCode).text().not_null())
                    .col(ColumnDef::new(ExtrasExportTemplates::MimeType).string_len(50).not_null().default(""))
                    .col(ColumnDef::new(ExtrasExportTemplates::FileExtension).string_len(15).not_null().default(""))
                    .col(ColumnDef::new(ExtrasExportTemplates::AsAttachment).boolean().not_null().default(true))
                    .col(timestamp(ExtrasExportTemplates::Created))
                    .col(timestamp(ExtrasExportTemplates::LastUpdated))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ux_export_templates_type_name")
                    .table(ExtrasExportTemplates::Table)
                    .col(ExtrasExportTemplates::ObjectType)
                    .col(ExtrasExportTemplates::Name)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExtrasObjectChanges::Table)
                    .if_not_exists()
                    .col(id_col(ExtrasObjectChanges::Id))
                    .col(timestamp(ExtrasObjectChanges::Time))
                    .col(ColumnDef::new(ExtrasObjectChanges::UserName).string_len(150).not_null().default(""))
                    .col(ColumnDef::new(ExtrasObjectChanges::RequestId).string_len(64).null())
                    .col(ColumnDef::new(ExtrasObjectChanges::Action).string_len(16).not_null())
                    .col(ColumnDef::new(ExtrasObjectChanges::ChangedObjectType).string_len(100).not_null())
                    .col(ColumnDef::new(ExtrasObjectChanges::ChangedObjectId).big_integer().not_null())
                    .col(ColumnDef::new(ExtrasObjectChanges::ObjectRepr).string_len(200).not_null())
                    .col(ColumnDef::new(ExtrasObjectChanges::PrechangeData).json_binary().null())
                    .col(ColumnDef::new(ExtrasObjectChanges::PostchangeData).json_binary().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_object_changes_object")
                    .table(ExtrasObjectChanges::Table)
                    .col(ExtrasObjectChanges::ChangedObjectType)
                    .col(ExtrasObjectChanges::ChangedObjectId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExtrasObjectChanges::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExtrasExportTemplates::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExtrasCustomFields::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExtrasTaggedItems::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExtrasTags::Table).if_exists().to_owned())
            .await
    }
}
