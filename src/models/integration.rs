//! Integration entity model
//!
//! An integration binds a tenant to one storefront platform (Shopify or
//! WooCommerce). Order webhooks authenticate against the integration's own
//! secret rather than the tenant-level one, so a compromised store can be
//! rotated without touching the rest of the tenant.

use super::tenant::Entity as Tenant;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Integration entity representing one connected storefront
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "integrations")]
pub struct Model {
    /// Unique identifier for the integration (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning tenant identifier
    pub tenant_id: Uuid,

    /// Storefront platform slug (`shopify` or `woocommerce`)
    pub platform: String,

    /// Store domain, e.g. `acme.myshopify.com`
    pub shop_domain: Option<String>,

    /// Platform API access token, if the integration pulls data back
    pub access_token: Option<String>,

    /// Per-integration webhook secret in the `wh_<40 hex>` format
    pub webhook_secret: String,

    /// Whether the integration currently accepts webhooks
    pub active: bool,

    /// Timestamp when the integration was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the integration was last updated
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
