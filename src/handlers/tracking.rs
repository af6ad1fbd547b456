//! # Tracking Handlers
//!
//! Operator-triggered shipment tracking refresh. Courier failures surface
//! as 502 with the aggregated attempt detail; the original webhook caller
//! is never involved in this path.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::OperatorAuth;
use crate::error::{ApiError, upstream_error, validation_error};
use crate::repositories::OrderRepository;
use crate::server::AppState;
use crate::tracking::{NormalizedTracking, ReconcileError, Reconciler};

/// Handler for `POST /api/orders/{id}/tracking/refresh`.
#[utoipa::path(
    post,
    path = "/api/orders/{id}/tracking/refresh",
    params(("id" = Uuid, Path, description = "Order identifier")),
    responses(
        (status = 200, description = "Normalized tracking status", body = NormalizedTracking),
        (status = 400, description = "Order has no tracking number", body = ApiError),
        (status = 401, description = "Operator authentication required", body = ApiError),
        (status = 404, description = "Order not found", body = ApiError),
        (status = 502, description = "All courier candidates failed", body = ApiError),
    ),
    security(("bearer_auth" = [])),
    tag = "tracking"
)]
pub async fn refresh_tracking(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    Path(order_id): Path<Uuid>,
) -> Result<Json<NormalizedTracking>, ApiError> {
    let reconciler = Reconciler::new(
        OrderRepository::new(state.db.clone()),
        state.courier.clone(),
    );

    match reconciler.reconcile(order_id).await {
        Ok(normalized) => Ok(Json(normalized)),
        Err(ReconcileError::OrderNotFound(id)) => Err(ApiError::new(
            axum::http::StatusCode::NOT_FOUND,
            "NOT_FOUND",
            &format!("Order {id} not found"),
        )),
        Err(ReconcileError::NoTrackingNumber(id)) => Err(validation_error(
            "Order has no tracking number to reconcile",
            json!({ "order_id": id.to_string() }),
        )),
        Err(ReconcileError::AllCandidatesFailed {
            last_slug,
            last_error,
            attempted,
        }) => Err(upstream_error(
            &last_slug,
            502,
            Some(format!(
                "all couriers failed (attempted: {}); last error: {}",
                attempted.join(", "),
                last_error
            )),
        )),
        Err(ReconcileError::CourierFailed { slug, source }) => {
            Err(upstream_error(&slug, 502, Some(source.to_string())))
        }
        Err(ReconcileError::Database(err)) => Err(ApiError::from(err)),
    }
}
