//! # Server Configuration
//!
//! Axum application assembly: shared state, routing, OpenAPI documentation,
//! and the listener. Webhook routes are public (secret-authenticated per
//! request); the `/api` surface sits behind operator bearer authentication.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::FromRef,
    middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth;
use crate::config::AppConfig;
use crate::diagnostics::DiagnosticLog;
use crate::handlers;
use crate::secrets::SecretRegistry;
use crate::tracking::CourierClient;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub secrets: SecretRegistry,
    pub diagnostics: DiagnosticLog,
    pub courier: CourierClient,
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DatabaseConnection) -> Result<Self, reqwest::Error> {
        let outbound_timeout = Duration::from_millis(config.outbound_timeout_ms);
        let courier = CourierClient::new(
            config.courier_api_base.clone(),
            config.courier_api_key.clone(),
            outbound_timeout,
        )?;

        Ok(Self {
            secrets: SecretRegistry::new(db.clone()),
            diagnostics: DiagnosticLog::new(db.clone()),
            courier,
            db,
            config,
        })
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let operator_routes = Router::new()
        .route(
            "/api/orders/{id}/tracking/refresh",
            post(handlers::tracking::refresh_tracking),
        )
        .route(
            "/api/diagnostics/webhooks",
            get(handlers::diagnostics::list_webhook_logs)
                .delete(handlers::diagnostics::clear_webhook_logs),
        )
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/webhook/lead", post(handlers::webhooks::create_lead))
        .route(
            "/webhook/customer",
            post(handlers::webhooks::create_customer),
        )
        .route(
            "/webhook/orders/{platform}",
            post(handlers::webhooks::ingest_order),
        )
        .merge(operator_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: Arc<AppConfig>,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let state = AppState::new(Arc::clone(&config), db)?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::webhooks::create_lead,
        crate::handlers::webhooks::create_customer,
        crate::handlers::webhooks::ingest_order,
        crate::handlers::tracking::refresh_tracking,
        crate::handlers::diagnostics::list_webhook_logs,
        crate::handlers::diagnostics::clear_webhook_logs,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::handlers::webhooks::LeadResponse,
            crate::handlers::webhooks::CustomerResponse,
            crate::handlers::webhooks::OrderIngestResponse,
            crate::handlers::diagnostics::WebhookLogEntry,
            crate::handlers::diagnostics::ClearLogsResponse,
            crate::tracking::NormalizedTracking,
        )
    ),
    info(
        title = "Orderdesk Ingestion API",
        description = "Multi-tenant webhook ingestion for e-commerce CRM data",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
