//! Migration to create the leads table.
//!
//! Leads carry three independent status axes (logistics, cash-on-delivery,
//! KPI pipeline stage) stored as text against closed sets enforced at the
//! validation layer.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Leads::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Leads::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Leads::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Leads::Source).text().not_null())
                    .col(ColumnDef::new(Leads::Name).text().null())
                    .col(ColumnDef::new(Leads::Email).text().null())
                    .col(ColumnDef::new(Leads::Phone).text().null())
                    .col(ColumnDef::new(Leads::Notes).text().null())
                    .col(ColumnDef::new(Leads::LogisticStatus).text().null())
                    .col(ColumnDef::new(Leads::CodStatus).text().null())
                    .col(ColumnDef::new(Leads::KpiStatus).text().null())
                    .col(
                        ColumnDef::new(Leads::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Leads::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leads_tenant_id")
                            .from(Leads::Table, Leads::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_leads_tenant_created")
                    .table(Leads::Table)
                    .col(Leads::TenantId)
                    .col(Leads::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_leads_tenant_created").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Leads::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Leads {
    Table,
    Id,
    TenantId,
    Source,
    Name,
    Email,
    Phone,
    Notes,
    LogisticStatus,
    CodStatus,
    KpiStatus,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}
