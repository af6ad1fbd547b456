//! Migration to create the notification_jobs table.
//!
//! Jobs are claimed by workers through a processing status plus ownership
//! token, so multiple worker instances cannot double-process a job.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NotificationJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NotificationJobs::TenantId).uuid().not_null())
                    .col(ColumnDef::new(NotificationJobs::OrderId).uuid().not_null())
                    .col(
                        ColumnDef::new(NotificationJobs::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(NotificationJobs::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(NotificationJobs::MaxAttempts)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(ColumnDef::new(NotificationJobs::ClaimedBy).text().null())
                    .col(
                        ColumnDef::new(NotificationJobs::ClaimedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(NotificationJobs::LastError).text().null())
                    .col(
                        ColumnDef::new(NotificationJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(NotificationJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_jobs_tenant_id")
                            .from(NotificationJobs::Table, NotificationJobs::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_jobs_order_id")
                            .from(NotificationJobs::Table, NotificationJobs::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Sweep picks oldest pending first
        manager
            .create_index(
                Index::create()
                    .name("idx_notification_jobs_status_created")
                    .table(NotificationJobs::Table)
                    .col(NotificationJobs::Status)
                    .col(NotificationJobs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_notification_jobs_status_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(NotificationJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum NotificationJobs {
    Table,
    Id,
    TenantId,
    OrderId,
    Status,
    Attempts,
    MaxAttempts,
    ClaimedBy,
    ClaimedAt,
    LastError,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
}
