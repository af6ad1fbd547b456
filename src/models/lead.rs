//! Lead entity model
//!
//! Leads carry three independent status tracks, each drawn from a closed
//! set enforced at the validation layer:
//!   logistic: pending | confirmed | shipped | delivered | returned
//!   cod:      pending | collected | refused
//!   kpi:      new | contacted | qualified | won | lost

use super::tenant::Entity as Tenant;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Lead entity scoped to a tenant
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "leads")]
pub struct Model {
    /// Unique identifier for the lead (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning tenant identifier
    pub tenant_id: Uuid,

    /// Channel the lead arrived through (required on every lead)
    pub source: String,

    /// Lead full name
    pub name: Option<String>,

    /// Lead email
    pub email: Option<String>,

    /// Lead phone number
    pub phone: Option<String>,

    /// Free-form notes
    pub notes: Option<String>,

    /// Logistic status track
    pub logistic_status: Option<String>,

    /// Cash-on-delivery status track
    pub cod_status: Option<String>,

    /// Sales pipeline status track
    pub kpi_status: Option<String>,

    /// Timestamp when the lead was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the lead was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Tenant",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
    #[sea_orm(has_many = "super::lead_event::Entity")]
    Events,
}

impl Related<Tenant> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::lead_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Events.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
