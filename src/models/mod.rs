//! # Data Models
//!
//! SeaORM entity models for every table the ingestion service owns.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod customer;
pub mod integration;
pub mod lead;
pub mod lead_event;
pub mod lead_tag;
pub mod notification_job;
pub mod order;
pub mod order_item;
pub mod tag;
pub mod tenant;
pub mod webhook_log;

pub use customer::Entity as Customer;
pub use integration::Entity as Integration;
pub use lead::Entity as Lead;
pub use lead_event::Entity as LeadEvent;
pub use lead_tag::Entity as LeadTag;
pub use notification_job::Entity as NotificationJob;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use tag::Entity as Tag;
pub use tenant::Entity as Tenant;
pub use webhook_log::Entity as WebhookLog;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "orderdesk".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
