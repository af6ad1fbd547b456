//! OrderItem entity model

use super::order::Entity as Order;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// Line item belonging to an order
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    /// Unique identifier for the line item (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning order identifier
    pub order_id: Uuid,

    /// Stock keeping unit, if the platform provides one
    pub sku: Option<String>,

    /// Item title as the platform reported it
    pub title: String,

    /// Quantity ordered
    pub quantity: i32,

    /// Price per unit in the order currency
    pub unit_price: f64,
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
