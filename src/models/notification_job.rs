//! NotificationJob entity model
//!
//! A queued notification about a newly ingested order. Jobs move through
//! `pending -> processing -> completed | failed`; a `processing` row always
//! carries the claim columns, and claims that outlive the reclaim window are
//! swept back to `pending`.

use super::order::Entity as Order;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Notification job row
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "notification_jobs")]
pub struct Model {
    /// Unique identifier for the job (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning tenant identifier
    pub tenant_id: Uuid,

    /// Order the notification is about
    pub order_id: Uuid,

    /// Current status (`pending`, `processing`, `completed`, `failed`)
    pub status: String,

    /// Delivery attempts made so far
    pub attempts: i32,

    /// Attempt ceiling; the job fails permanently once reached
    pub max_attempts: i32,

    /// Worker identifier holding the claim, while `processing`
    pub claimed_by: Option<String>,

    /// When the current claim was taken, while `processing`
    pub claimed_at: Option<DateTimeWithTimeZone>,

    /// Last delivery error message, if any attempt failed
    pub last_error: Option<String>,

    /// Timestamp when the job was enqueued
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the job was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Order",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<Order> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Job lifecycle states as stored in the `status` column.
pub mod status {
    pub const PENDING: &str = "pending";
    pub const PROCESSING: &str = "processing";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
}
