//! # Webhook Ingestion Handlers
//!
//! The public ingestion surface. Every endpoint authenticates against a
//! shared secret (`x-webhook-secret`), validates the payload against its
//! declared schema, performs the primary write, and then runs best-effort
//! side effects (tags, notification enqueue) that can never fail the
//! request. The diagnostic logger records the full lifecycle of each
//! request under one request id.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::diagnostics::DiagnosticLog;
use crate::error::{ApiError, unauthorized, validation_error};
use crate::models::{customer, lead, order, tenant};
use crate::repositories::{
    CustomerRepository, LeadRepository, NewCustomer, NewLead, NewOrder, NewOrderItem,
    NotificationJobRepository, OrderRepository,
};
use crate::repositories::customer::CustomerCreateOutcome;
use crate::secrets;
use crate::server::AppState;
use crate::validation::{CUSTOMER_SCHEMA, LEAD_SCHEMA, ORDER_SCHEMA, field_error_map};

const SECRET_HEADER: &str = "x-webhook-secret";
const SIGNATURE_HEADER: &str = "x-shopify-hmac-sha256";

/// Created-lead summary returned to the webhook caller
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LeadResponse {
    pub id: Uuid,
    pub source: String,
    pub kpi_status: Option<String>,
}

/// Created-customer summary returned to the webhook caller
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Order ingestion acknowledgement
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderIngestResponse {
    pub order_id: Uuid,
    pub external_order_id: String,
    /// Whether this delivery created the order (false on re-delivery)
    pub created: bool,
}

impl From<lead::Model> for LeadResponse {
    fn from(model: lead::Model) -> Self {
        Self {
            id: model.id,
            source: model.source,
            kpi_status: model.kpi_status,
        }
    }
}

impl From<customer::Model> for CustomerResponse {
    fn from(model: customer::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
        }
    }
}

/// Handler for `POST /webhook/lead`.
#[utoipa::path(
    post,
    path = "/webhook/lead",
    request_body = Value,
    responses(
        (status = 201, description = "Lead created", body = LeadResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Missing or invalid webhook secret", body = ApiError),
    ),
    tag = "webhooks"
)]
pub async fn create_lead(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<LeadResponse>), ApiError> {
    let request_id = log_entry(&state.diagnostics, "/webhook/lead", &headers, &body).await;

    let tenant = authenticate_tenant(&state, &headers, request_id).await?;
    let payload = parse_json_body(&state, &headers, &body, request_id).await?;
    validate_payload(&state, &LEAD_SCHEMA, &payload, request_id).await?;

    let tags: Vec<String> = payload["tags"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let new = NewLead {
        source: required_str(&payload, "source"),
        name: optional_str(&payload, "name"),
        email: optional_str(&payload, "email"),
        phone: optional_str(&payload, "phone"),
        notes: optional_str(&payload, "notes"),
        logistic_status: optional_str(&payload, "logistic_status"),
        cod_status: optional_str(&payload, "cod_status"),
        kpi_status: optional_str(&payload, "kpi_status"),
    };

    let repo = LeadRepository::new(state.db.clone());
    let lead = repo.create(tenant.id, new).await.map_err(ApiError::from)?;

    // Best-effort side effect: the lead stands even if tagging fails.
    if !tags.is_empty() {
        repo.attach_tags(tenant.id, lead.id, &tags).await;
    }

    state
        .diagnostics
        .log_response(request_id, json!({ "status": 201, "lead_id": lead.id }))
        .await;

    Ok((StatusCode::CREATED, Json(lead.into())))
}

/// Handler for `POST /webhook/customer`.
#[utoipa::path(
    post,
    path = "/webhook/customer",
    request_body = Value,
    responses(
        (status = 201, description = "Customer created", body = CustomerResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Missing or invalid webhook secret", body = ApiError),
        (status = 409, description = "Customer with this email already exists", body = ApiError),
    ),
    tag = "webhooks"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    let request_id = log_entry(&state.diagnostics, "/webhook/customer", &headers, &body).await;

    let tenant = authenticate_tenant(&state, &headers, request_id).await?;
    let payload = parse_json_body(&state, &headers, &body, request_id).await?;
    validate_payload(&state, &CUSTOMER_SCHEMA, &payload, request_id).await?;

    let new = NewCustomer {
        name: required_str(&payload, "name"),
        email: required_str(&payload, "email"),
        phone: optional_str(&payload, "phone"),
        address: optional_str(&payload, "address"),
        source: optional_str(&payload, "source"),
    };

    let repo = CustomerRepository::new(state.db.clone());
    match repo.create(tenant.id, new).await.map_err(ApiError::from)? {
        CustomerCreateOutcome::Created(customer) => {
            state
                .diagnostics
                .log_response(request_id, json!({ "status": 201, "customer_id": customer.id }))
                .await;
            Ok((StatusCode::CREATED, Json(customer.into())))
        }
        CustomerCreateOutcome::Duplicate(existing) => {
            state
                .diagnostics
                .log_response(
                    request_id,
                    json!({ "status": 409, "customer_id": existing.id }),
                )
                .await;
            Err(ApiError::new(
                StatusCode::CONFLICT,
                "CONFLICT",
                "A customer with this email already exists",
            ))
        }
    }
}

/// Handler for the platform order webhook.
///
/// Authenticated by the per-integration secret; when the platform also
/// signs the body (`X-Shopify-Hmac-Sha256`), the signature is verified
/// before the payload is trusted.
#[utoipa::path(
    post,
    path = "/webhook/orders/{platform}",
    params(("platform" = String, Path, description = "Storefront platform (shopify|woocommerce)")),
    request_body = Value,
    responses(
        (status = 200, description = "Order updated (re-delivery)", body = OrderIngestResponse),
        (status = 201, description = "Order created", body = OrderIngestResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Missing or invalid integration secret", body = ApiError),
        (status = 404, description = "Unknown platform", body = ApiError),
    ),
    tag = "webhooks"
)]
pub async fn ingest_order(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<OrderIngestResponse>), ApiError> {
    let path = format!("/webhook/orders/{platform}");
    let request_id = log_entry(&state.diagnostics, &path, &headers, &body).await;

    if !matches!(platform.as_str(), "shopify" | "woocommerce") {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            &format!("Unknown platform '{platform}'"),
        ));
    }

    let presented = extract_secret(&headers)?;
    let integration = state
        .secrets
        .resolve_integration(presented)
        .await
        .map_err(|e| ApiError::from(anyhow::Error::from(e)))?
        .filter(|i| i.platform == platform)
        .ok_or_else(|| {
            unauthorized(Some("Unknown or inactive integration secret"))
        })?;

    // Signature verification, when the platform provides one.
    if let Some(signature) = headers.get(SIGNATURE_HEADER) {
        let signature = signature
            .to_str()
            .map_err(|_| unauthorized(Some("Invalid signature header")))?;
        secrets::verify_hmac_signature(&body, signature, &integration.webhook_secret)
            .map_err(|_| unauthorized(Some("Signature verification failed")))?;
    }

    let payload = parse_json_body(&state, &headers, &body, request_id).await?;
    validate_payload(&state, &ORDER_SCHEMA, &payload, request_id).await?;

    let tenant = tenant_for_integration(&state, integration.tenant_id).await?;

    // Link a customer when the payload names one; repeat purchases attach
    // to the existing row.
    let customer_id = match optional_str(&payload, "customer_email") {
        Some(email) => {
            let customer = CustomerRepository::new(state.db.clone())
                .find_or_create(
                    tenant.id,
                    NewCustomer {
                        name: optional_str(&payload, "customer_name")
                            .unwrap_or_else(|| email.clone()),
                        email,
                        phone: optional_str(&payload, "customer_phone"),
                        address: optional_str(&payload, "customer_address"),
                        source: Some(platform.clone()),
                    },
                )
                .await
                .map_err(ApiError::from)?;
            Some(customer.id)
        }
        None => None,
    };

    let new = NewOrder {
        external_order_id: required_str(&payload, "external_order_id"),
        customer_id,
        status: optional_str(&payload, "status").unwrap_or_else(|| "pending".to_string()),
        total: parse_total(&payload),
        currency: optional_str(&payload, "currency").unwrap_or_else(|| "EUR".to_string()),
        tracking_number: optional_str(&payload, "tracking_number"),
        placed_at: parse_placed_at(&payload),
        items: parse_items(&payload),
    };

    let (order, created) = OrderRepository::new(state.db.clone())
        .upsert(integration.id, new)
        .await
        .map_err(ApiError::from)?;

    // Fire-and-forget: the caller's response never waits on notification
    // delivery, and an enqueue failure is logged, not surfaced.
    enqueue_notification(&state, &tenant, &order, request_id).await;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    state
        .diagnostics
        .log_response(
            request_id,
            json!({ "status": status.as_u16(), "order_id": order.id, "created": created }),
        )
        .await;

    Ok((
        status,
        Json(OrderIngestResponse {
            order_id: order.id,
            external_order_id: order.external_order_id,
            created,
        }),
    ))
}

async fn enqueue_notification(
    state: &AppState,
    tenant: &tenant::Model,
    order: &order::Model,
    request_id: Uuid,
) {
    let repo = NotificationJobRepository::new(state.db.clone());
    match repo
        .enqueue(tenant.id, order.id, state.config.queue.max_attempts)
        .await
    {
        Ok(job) => {
            state
                .diagnostics
                .log_step(request_id, json!({ "stage": "notification_enqueued", "job_id": job.id }))
                .await;
        }
        Err(err) => {
            warn!(order_id = %order.id, error = %err, "Notification enqueue failed");
        }
    }
}

// Shared request plumbing

async fn log_entry(
    diagnostics: &DiagnosticLog,
    path: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> Uuid {
    let mut header_map = serde_json::Map::new();
    for name in [SECRET_HEADER, SIGNATURE_HEADER, "content-type"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            header_map.insert(name.to_string(), Value::String(value.to_string()));
        }
    }

    diagnostics
        .log_request(json!({
            "path": path,
            "headers": header_map,
            "body_bytes": body.len(),
        }))
        .await
}

fn extract_secret(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized(Some("Missing x-webhook-secret header")))
}

async fn authenticate_tenant(
    state: &AppState,
    headers: &HeaderMap,
    request_id: Uuid,
) -> Result<tenant::Model, ApiError> {
    let presented = extract_secret(headers)?;

    let resolved = state
        .secrets
        .resolve_tenant(presented)
        .await
        .map_err(|e| ApiError::from(anyhow::Error::from(e)))?;

    match resolved {
        Some(tenant) => {
            state
                .diagnostics
                .log_step(request_id, json!({ "stage": "authenticated", "tenant_id": tenant.id }))
                .await;
            Ok(tenant)
        }
        None => {
            state
                .diagnostics
                .log_response(request_id, json!({ "status": 401 }))
                .await;
            Err(unauthorized(Some("Unknown webhook secret")))
        }
    }
}

async fn parse_json_body(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
    request_id: Uuid,
) -> Result<Value, ApiError> {
    let is_json = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if !is_json {
        let error = validation_error(
            "Content-Type must be application/json",
            json!({ "content-type": "Expected application/json" }),
        );
        state
            .diagnostics
            .log_response(request_id, json!({ "status": 400, "reason": "content_type" }))
            .await;
        return Err(error);
    }

    serde_json::from_slice(body).map_err(|err| {
        validation_error(
            "Request body is not valid JSON",
            json!({ "body": err.to_string() }),
        )
    })
}

async fn validate_payload(
    state: &AppState,
    schema: &crate::validation::EndpointSchema,
    payload: &Value,
    request_id: Uuid,
) -> Result<(), ApiError> {
    if let Err(errors) = schema.validate(payload) {
        let details = field_error_map(&errors);
        state
            .diagnostics
            .log_response(request_id, json!({ "status": 400, "fields": details }))
            .await;
        return Err(validation_error("Validation failed", details));
    }

    state
        .diagnostics
        .log_step(request_id, json!({ "stage": "validated" }))
        .await;
    Ok(())
}

// Payload field extraction (post-validation, so shapes are known)

fn required_str(payload: &Value, key: &str) -> String {
    payload[key].as_str().unwrap_or_default().trim().to_string()
}

fn optional_str(payload: &Value, key: &str) -> Option<String> {
    payload[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_total(payload: &Value) -> f64 {
    match &payload["total"] {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_placed_at(payload: &Value) -> Option<DateTimeWithTimeZone> {
    optional_str(payload, "placed_at")
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
}

fn parse_items(payload: &Value) -> Vec<NewOrderItem> {
    let Some(items) = payload["items"].as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .map(|item| NewOrderItem {
            sku: item["sku"].as_str().map(str::to_string),
            title: item["title"]
                .as_str()
                .unwrap_or("(untitled item)")
                .to_string(),
            quantity: item["quantity"].as_i64().unwrap_or(1) as i32,
            unit_price: item["unit_price"].as_f64().unwrap_or(0.0),
        })
        .collect()
}

async fn tenant_for_integration(
    state: &AppState,
    tenant_id: Uuid,
) -> Result<tenant::Model, ApiError> {
    use sea_orm::EntityTrait;

    tenant::Entity::find_by_id(tenant_id)
        .one(&state.db)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Integration references a missing tenant",
            )
        })
}
