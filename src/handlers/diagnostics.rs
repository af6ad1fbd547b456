//! # Diagnostics Handlers
//!
//! Operator-only access to the webhook diagnostic trail: read recent
//! entries, or clear the table. Both operations require a bearer token;
//! the trail carries redacted payloads only, but it still describes
//! integration traffic and is not a public surface.

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::error::ApiError;
use crate::models::webhook_log;
use crate::server::AppState;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 500;

/// Query parameters for listing diagnostic entries
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListLogsQuery {
    /// Maximum entries to return (default 50, cap 500)
    pub limit: Option<u64>,
}

/// One diagnostic trail entry
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookLogEntry {
    pub id: Uuid,
    pub request_id: Uuid,
    pub phase: String,
    pub detail: Option<Value>,
    pub created_at: String,
}

impl From<webhook_log::Model> for WebhookLogEntry {
    fn from(model: webhook_log::Model) -> Self {
        Self {
            id: model.id,
            request_id: model.request_id,
            phase: model.phase,
            detail: model.detail,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

/// Response for the clear operation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClearLogsResponse {
    pub removed: u64,
}

/// Handler for `GET /api/diagnostics/webhooks`.
#[utoipa::path(
    get,
    path = "/api/diagnostics/webhooks",
    params(ListLogsQuery),
    responses(
        (status = 200, description = "Recent diagnostic entries, newest first", body = [WebhookLogEntry]),
        (status = 401, description = "Operator authentication required", body = ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "diagnostics"
)]
pub async fn list_webhook_logs(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    Query(query): Query<ListLogsQuery>,
) -> Result<Json<Vec<WebhookLogEntry>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let rows = state
        .diagnostics
        .recent(limit)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(rows.into_iter().map(WebhookLogEntry::from).collect()))
}

/// Handler for `DELETE /api/diagnostics/webhooks`.
#[utoipa::path(
    delete,
    path = "/api/diagnostics/webhooks",
    responses(
        (status = 200, description = "Trail cleared", body = ClearLogsResponse),
        (status = 401, description = "Operator authentication required", body = ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "diagnostics"
)]
pub async fn clear_webhook_logs(
    State(state): State<AppState>,
    _auth: OperatorAuth,
) -> Result<Json<ClearLogsResponse>, ApiError> {
    let removed = state.diagnostics.clear().await.map_err(ApiError::from)?;
    Ok(Json(ClearLogsResponse { removed }))
}
