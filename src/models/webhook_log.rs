//! WebhookLog entity model
//!
//! Diagnostic trail rows. Each inbound webhook writes one `request` row, any
//! number of `step` rows, and one `response` row, all sharing a request_id.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Diagnostic log row for webhook traffic
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "webhook_logs")]
pub struct Model {
    /// Unique identifier for the log row (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Correlation identifier shared by all rows of one request
    pub request_id: Uuid,

    /// Lifecycle phase (`request`, `step`, `response`)
    pub phase: String,

    /// Structured detail payload, already redacted
    #[sea_orm(column_type = "JsonBinary")]
    pub detail: Option<JsonValue>,

    /// Timestamp when the row was written
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
