//! LeadEvent entity model
//!
//! Append-only audit trail for a lead. Rows are created together with their
//! lead (the `created` event) or on later status changes, and never updated.

use super::lead::Entity as Lead;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Audit event attached to a lead
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "lead_events")]
pub struct Model {
    /// Unique identifier for the event (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Lead the event belongs to
    pub lead_id: Uuid,

    /// Event type (e.g. `created`, `status_changed`)
    pub event_type: String,

    /// Structured event payload
    #[sea_orm(column_type = "JsonBinary")]
    pub detail: Option<JsonValue>,

    /// Timestamp when the event was recorded
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Lead",
        from = "Column::LeadId",
        to = "super::lead::Column::Id"
    )]
    Lead,
}

impl Related<Lead> for Entity {
    fn to() -> RelationDef {
        Relation::Lead.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
