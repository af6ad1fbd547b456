//! Migration to create the webhook_logs table.
//!
//! Append-only diagnostic trail for inbound webhook traffic. Rows carry a
//! request_id so a full request lifecycle can be reconstructed.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WebhookLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WebhookLogs::RequestId).uuid().not_null())
                    .col(ColumnDef::new(WebhookLogs::Phase).text().not_null())
                    .col(ColumnDef::new(WebhookLogs::Detail).json_binary().null())
                    .col(
                        ColumnDef::new(WebhookLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_logs_request")
                    .table(WebhookLogs::Table)
                    .col(WebhookLogs::RequestId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_logs_created")
                    .table(WebhookLogs::Table)
                    .col(WebhookLogs::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_webhook_logs_created").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_webhook_logs_request").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(WebhookLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WebhookLogs {
    Table,
    Id,
    RequestId,
    Phase,
    Detail,
    CreatedAt,
}
