//! # Shipment Tracking Reconciler
//!
//! Resolves an order's bare tracking number to a courier and a normalized
//! tracking status. With no stored courier slug, candidates from a fixed
//! ranked list are tried in order: register, and on an "already exists"
//! answer fetch instead, stopping at the first success. The winning slug is
//! persisted on the order so later refreshes query that courier directly.
//!
//! The provider offers auto-detection, but the ranked list is deliberately
//! scoped to the couriers actually integrated: one wasted call per miss
//! buys determinism and avoids unsupported-courier false positives.

pub mod courier;

pub use courier::{Checkpoint, CourierApi, CourierClient, CourierError, TrackingData};

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::repositories::OrderRepository;

/// Supported couriers, in detection order.
pub const RANKED_COURIERS: &[&str] = &["brt", "gls", "sda-it", "tnt-it", "poste-italiane"];

/// Errors from a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("order {0} has no tracking number")]
    NoTrackingNumber(Uuid),

    #[error("all couriers failed; last attempted '{last_slug}': {last_error}")]
    AllCandidatesFailed {
        last_slug: String,
        last_error: CourierError,
        attempted: Vec<String>,
    },

    #[error("courier '{slug}' failed: {source}")]
    CourierFailed {
        slug: String,
        source: CourierError,
    },

    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
}

/// Display-ready tracking status for the dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NormalizedTracking {
    pub courier_slug: String,
    pub tracking_number: String,
    /// Human-readable status label.
    pub status: String,
    /// Message of the most recent checkpoint, if any.
    pub last_message: Option<String>,
    /// Location of the most recent checkpoint, if any.
    pub last_location: Option<String>,
    /// Timestamp of the most recent checkpoint, as the provider reports it.
    pub last_checkpoint_at: Option<String>,
    pub expected_delivery: Option<String>,
}

/// Map a provider status tag to a display label. Unknown tags pass through
/// unchanged rather than being hidden behind a generic label.
pub fn display_status(tag: Option<&str>) -> String {
    match tag {
        Some("Pending") | None => "Pending".to_string(),
        Some("InfoReceived") => "Info received".to_string(),
        Some("InTransit") => "In transit".to_string(),
        Some("OutForDelivery") => "Out for delivery".to_string(),
        Some("AttemptFail") => "Delivery attempt failed".to_string(),
        Some("Delivered") => "Delivered".to_string(),
        Some("AvailableForPickup") => "Available for pickup".to_string(),
        Some("Exception") => "Exception".to_string(),
        Some("Expired") => "Expired".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Normalize raw provider data into the display shape.
pub fn normalize(data: &TrackingData) -> NormalizedTracking {
    let latest = data.checkpoints.last();

    NormalizedTracking {
        courier_slug: data.slug.clone(),
        tracking_number: data.tracking_number.clone(),
        status: display_status(data.tag.as_deref()),
        last_message: latest.and_then(|c| c.message.clone()),
        last_location: latest.and_then(|c| c.location.clone()),
        last_checkpoint_at: latest.and_then(|c| c.checkpoint_time.clone()),
        expected_delivery: data.expected_delivery.clone(),
    }
}

/// Reconciler over the order store and a courier API.
pub struct Reconciler<C: CourierApi> {
    orders: OrderRepository,
    courier: C,
}

impl<C: CourierApi> Reconciler<C> {
    pub fn new(orders: OrderRepository, courier: C) -> Self {
        Self { orders, courier }
    }

    /// Reconcile one order's tracking state.
    pub async fn reconcile(&self, order_id: Uuid) -> Result<NormalizedTracking, ReconcileError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(ReconcileError::OrderNotFound(order_id))?;

        let tracking_number = order
            .tracking_number
            .clone()
            .ok_or(ReconcileError::NoTrackingNumber(order_id))?;

        // Known courier: query directly, no detection pass.
        if let Some(slug) = order.courier_slug.clone() {
            let data = self
                .courier
                .fetch(&slug, &tracking_number)
                .await
                .map_err(|source| ReconcileError::CourierFailed { slug, source })?;
            return Ok(normalize(&data));
        }

        let mut attempted = Vec::new();
        let mut last_failure: Option<(String, CourierError)> = None;

        for &slug in RANKED_COURIERS {
            attempted.push(slug.to_string());

            match self.attempt(slug, &tracking_number).await {
                Ok(data) => {
                    self.orders.set_courier(order, slug).await?;
                    return Ok(normalize(&data));
                }
                Err(err) => {
                    tracing::debug!(
                        %order_id,
                        courier = slug,
                        error = %err,
                        "Courier candidate failed, trying next"
                    );
                    last_failure = Some((slug.to_string(), err));
                }
            }
        }

        let (last_slug, last_error) =
            last_failure.expect("ranked courier list is never empty");
        Err(ReconcileError::AllCandidatesFailed {
            last_slug,
            last_error,
            attempted,
        })
    }

    /// One candidate attempt: register, falling back to a fetch when the
    /// courier already knows this tracking number.
    async fn attempt(
        &self,
        slug: &str,
        tracking_number: &str,
    ) -> Result<TrackingData, CourierError> {
        match self.courier.register(slug, tracking_number).await {
            Ok(data) => Ok(data),
            Err(CourierError::AlreadyExists) => self.courier.fetch(slug, tracking_number).await,
            Err(err) => Err(err),
        }
    }
}
