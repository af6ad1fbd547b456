//! Order entity model
//!
//! Orders are idempotent on (integration_id, external_order_id): replayed
//! platform webhooks update the existing row instead of inserting a second
//! one. Tracking fields are filled in later by the shipment reconciler.

use super::integration::Entity as Integration;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Order entity keyed by the platform's own order identifier
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Integration the order arrived through
    pub integration_id: Uuid,

    /// Customer the order belongs to, when one could be matched
    pub customer_id: Option<Uuid>,

    /// Order identifier assigned by the storefront platform
    pub external_order_id: String,

    /// Fulfilment status of the order
    pub status: String,

    /// Order total in the order currency
    pub total: f64,

    /// ISO 4217 currency code
    pub currency: String,

    /// Carrier tracking number, once a shipment exists
    pub tracking_number: Option<String>,

    /// Courier slug the tracking number was registered under
    pub courier_slug: Option<String>,

    /// Timestamp the platform reports the order was placed
    pub placed_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the order was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the order was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Integration",
        from = "Column::IntegrationId",
        to = "super::integration::Column::Id"
    )]
    Integration,
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
}

impl Related<Integration> for Entity {
    fn to() -> RelationDef {
        Relation::Integration.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
