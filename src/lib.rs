//! # Orderdesk Ingestion Library
//!
//! Core functionality for the Orderdesk webhook ingestion service:
//! multi-tenant secret resolution, payload validation, idempotent
//! order/lead/customer persistence, the notification dispatch queue, the
//! shipment tracking reconciler, and the diagnostic trail.

pub mod auth;
pub mod config;
pub mod db;
pub mod diagnostics;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod queue;
pub mod repositories;
pub mod secrets;
pub mod server;
pub mod telemetry;
pub mod tracking;
pub mod validation;
pub use migration;
