//! Migration to create the tags and lead_tags tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tags::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tags::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Tags::Name).text().not_null())
                    .col(
                        ColumnDef::new(Tags::Color)
                            .text()
                            .not_null()
                            .default("#6b7280"),
                    )
                    .col(
                        ColumnDef::new(Tags::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tags_tenant_id")
                            .from(Tags::Table, Tags::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_tags_tenant_name")
                    .table(Tags::Table)
                    .col(Tags::TenantId)
                    .col(Tags::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LeadTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LeadTags::LeadId).uuid().not_null())
                    .col(ColumnDef::new(LeadTags::TagId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(LeadTags::LeadId)
                            .col(LeadTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lead_tags_lead_id")
                            .from(LeadTags::Table, LeadTags::LeadId)
                            .to(Leads::Table, Leads::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lead_tags_tag_id")
                            .from(LeadTags::Table, LeadTags::TagId)
                            .to(Tags::Table, Tags::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LeadTags::Table).to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("uq_tags_tenant_name").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tags {
    Table,
    Id,
    TenantId,
    Name,
    Color,
    CreatedAt,
}

#[derive(DeriveIden)]
enum LeadTags {
    Table,
    LeadId,
    TagId,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Leads {
    Table,
    Id,
}
