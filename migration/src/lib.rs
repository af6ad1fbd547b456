//! Database migrations for the Orderdesk ingestion service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_06_01_000001_create_tenants;
mod m2025_06_01_000002_create_integrations;
mod m2025_06_01_000003_create_customers;
mod m2025_06_01_000004_create_orders;
mod m2025_06_01_000005_create_order_items;
mod m2025_06_01_000006_create_leads;
mod m2025_06_01_000007_create_lead_events;
mod m2025_06_01_000008_create_tags;
mod m2025_06_01_000009_create_notification_jobs;
mod m2025_06_01_000010_create_webhook_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_06_01_000001_create_tenants::Migration),
            Box::new(m2025_06_01_000002_create_integrations::Migration),
            Box::new(m2025_06_01_000003_create_customers::Migration),
            Box::new(m2025_06_01_000004_create_orders::Migration),
            Box::new(m2025_06_01_000005_create_order_items::Migration),
            Box::new(m2025_06_01_000006_create_leads::Migration),
            Box::new(m2025_06_01_000007_create_lead_events::Migration),
            Box::new(m2025_06_01_000008_create_tags::Migration),
            Box::new(m2025_06_01_000009_create_notification_jobs::Migration),
            Box::new(m2025_06_01_000010_create_webhook_logs::Migration),
        ]
    }
}
