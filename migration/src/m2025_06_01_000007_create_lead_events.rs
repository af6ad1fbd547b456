//! Migration to create the lead_events table.
//!
//! Lead events are the append-only audit trail for lead state transitions.
//! There is deliberately no update path and no updated_at column.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LeadEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LeadEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LeadEvents::LeadId).uuid().not_null())
                    .col(ColumnDef::new(LeadEvents::EventType).text().not_null())
                    .col(ColumnDef::new(LeadEvents::Detail).json_binary().null())
                    .col(
                        ColumnDef::new(LeadEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lead_events_lead_id")
                            .from(LeadEvents::Table, LeadEvents::LeadId)
                            .to(Leads::Table, Leads::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_lead_events_lead_created")
                    .table(LeadEvents::Table)
                    .col(LeadEvents::LeadId)
                    .col(LeadEvents::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_lead_events_lead_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(LeadEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LeadEvents {
    Table,
    Id,
    LeadId,
    EventType,
    Detail,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Leads {
    Table,
    Id,
}
