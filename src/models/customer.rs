//! Customer entity model
//!
//! Customers are unique per tenant by email; a second registration with the
//! same email is rejected with a conflict rather than silently merged.

use super::tenant::Entity as Tenant;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Customer entity scoped to a tenant
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    /// Unique identifier for the customer (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning tenant identifier
    pub tenant_id: Uuid,

    /// Customer full name
    pub name: String,

    /// Customer email, unique within the tenant
    pub email: String,

    /// Customer phone number
    pub phone: Option<String>,

    /// Postal address
    pub address: Option<String>,

    /// Channel the customer arrived through (e.g. `webhook`, `import`)
    pub source: Option<String>,

    /// Timestamp when the customer was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the customer was last updated
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
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<Tenant> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
