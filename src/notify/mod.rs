//! # Notification Transport
//!
//! Delivery of order notifications to a tenant-configured destination. The
//! queue only sees the [`NotificationTransport`] trait; the concrete
//! Telegram transport lives behind it so queue failure semantics never
//! depend on the delivery mechanism.

pub mod telegram;

pub use telegram::TelegramTransport;

use async_trait::async_trait;
use thiserror::Error;

/// A formatted notification ready for delivery.
#[derive(Debug, Clone)]
pub struct NotificationMessage {
    /// Tenant-configured destination identifier.
    pub destination: String,
    /// Display text, already formatted.
    pub text: String,
}

/// Errors a transport can report. All of them count as a failed attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not configured")]
    NotConfigured,

    #[error("tenant has no notification destination")]
    NoDestination,

    #[error("delivery request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("delivery rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound notification delivery.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), TransportError>;
}

/// Format the text for an ingested-order notification.
pub fn format_order_message(
    external_order_id: &str,
    status: &str,
    total: f64,
    currency: &str,
    platform: &str,
) -> String {
    format!(
        "New order #{external_order_id} ({platform})\nStatus: {status}\nTotal: {total:.2} {currency}"
    )
}
