//! # API Handlers
//!
//! HTTP endpoint handlers: the public webhook ingestion surface and the
//! operator-only tracking/diagnostics surface.

use crate::models::ServiceInfo;
use axum::response::Json;

pub mod diagnostics;
pub mod tracking;
pub mod webhooks;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}
