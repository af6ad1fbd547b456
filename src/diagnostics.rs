//! # Webhook Diagnostic Logger
//!
//! Append-only, redacted audit trail for inbound webhook traffic. Every
//! request is assigned an id at entry; request, processing-step, and
//! response rows all carry that id so one request's lifecycle can be
//! reconstructed from the log.
//!
//! The sink is best-effort: a failed write degrades to a tracing event and
//! never fails the request being logged.

use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, DatabaseConnection, QueryOrder, QuerySelect, Set};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::webhook_log;

/// Field names whose values are always redacted before hitting the sink.
///
/// Redaction is opt-in by declaration: a new sensitive field is added here,
/// not patched at every call site.
const SENSITIVE_FIELDS: &[&str] = &[
    "x-webhook-secret",
    "webhook_secret",
    "secret",
    "x-shopify-hmac-sha256",
    "authorization",
    "access_token",
    "token",
];

/// Lifecycle phases a log row can belong to.
pub mod phase {
    pub const REQUEST: &str = "request";
    pub const STEP: &str = "step";
    pub const RESPONSE: &str = "response";
}

/// Redact a sensitive value to a short prefix plus a length annotation.
pub fn redact_value(value: &str) -> String {
    let prefix: String = value.chars().take(6).collect();
    format!("{}…(len={})", prefix, value.chars().count())
}

/// Apply the redaction policy to a JSON value, recursively.
///
/// Object keys are matched case-insensitively against the declared
/// sensitive set; matched string values are replaced, everything else is
/// passed through untouched.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::with_capacity(map.len());
            for (key, inner) in map {
                let lowered = key.to_ascii_lowercase();
                if SENSITIVE_FIELDS.contains(&lowered.as_str()) {
                    let replacement = match inner {
                        Value::String(s) => Value::String(redact_value(s)),
                        other => Value::String(redact_value(&other.to_string())),
                    };
                    redacted.insert(key.clone(), replacement);
                } else {
                    redacted.insert(key.clone(), redact(inner));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

/// Best-effort diagnostic log over the webhook_logs table.
#[derive(Clone)]
pub struct DiagnosticLog {
    db: DatabaseConnection,
}

impl DiagnosticLog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Record an inbound request and return its correlation id.
    pub async fn log_request(&self, detail: Value) -> Uuid {
        let request_id = Uuid::new_v4();
        self.write(request_id, phase::REQUEST, detail).await;
        request_id
    }

    /// Record an intermediate processing step for a request.
    pub async fn log_step(&self, request_id: Uuid, detail: Value) {
        self.write(request_id, phase::STEP, detail).await;
    }

    /// Record the final response for a request.
    pub async fn log_response(&self, request_id: Uuid, detail: Value) {
        self.write(request_id, phase::RESPONSE, detail).await;
    }

    async fn write(&self, request_id: Uuid, phase: &str, detail: Value) {
        let redacted = redact(&detail);

        let row = webhook_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            request_id: Set(request_id),
            phase: Set(phase.to_string()),
            detail: Set(Some(redacted.clone())),
            created_at: Set(chrono::Utc::now().into()),
        };

        if let Err(err) = row.insert(&self.db).await {
            // Degraded mode: the trail continues on the console only.
            tracing::warn!(
                %request_id,
                phase,
                error = %err,
                detail = %redacted,
                "Diagnostic sink unavailable, falling back to console"
            );
        }
    }

    /// Fetch the most recent log rows, newest first.
    pub async fn recent(&self, limit: u64) -> Result<Vec<webhook_log::Model>, sea_orm::DbErr> {
        webhook_log::Entity::find()
            .order_by_desc(webhook_log::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
    }

    /// Delete all log rows, returning how many were removed.
    pub async fn clear(&self) -> Result<u64, sea_orm::DbErr> {
        let result = webhook_log::Entity::delete_many().exec(&self.db).await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;
    use serde_json::json;

    async fn test_log() -> DiagnosticLog {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        Migrator::up(&db, None).await.expect("Migrations failed");
        DiagnosticLog::new(db)
    }

    #[test]
    fn test_redact_value_shape() {
        let redacted = redact_value("wh_0123456789abcdef0123456789abcdef01234567");
        assert_eq!(redacted, "wh_012…(len=43)");
    }

    #[test]
    fn test_redact_matches_keys_case_insensitively() {
        let input = json!({
            "X-Webhook-Secret": "wh_0123456789abcdef0123456789abcdef01234567",
            "source": "website",
            "nested": { "Authorization": "Bearer abcdef123456" }
        });

        let output = redact(&input);

        let secret = output["X-Webhook-Secret"].as_str().unwrap();
        assert!(secret.starts_with("wh_012"));
        assert!(!secret.contains("89abcdef"));
        assert_eq!(output["source"], "website");

        let auth = output["nested"]["Authorization"].as_str().unwrap();
        assert!(auth.starts_with("Bearer"));
        assert!(!auth.contains("abcdef123456"));
    }

    #[tokio::test]
    async fn test_lifecycle_rows_share_request_id() {
        let log = test_log().await;

        let request_id = log.log_request(json!({ "path": "/webhook/lead" })).await;
        log.log_step(request_id, json!({ "stage": "validated" })).await;
        log.log_response(request_id, json!({ "status": 201 })).await;

        let rows = log.recent(10).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.request_id == request_id));

        let phases: Vec<&str> = rows.iter().map(|r| r.phase.as_str()).collect();
        for expected in [phase::REQUEST, phase::STEP, phase::RESPONSE] {
            assert!(phases.contains(&expected));
        }
    }

    #[tokio::test]
    async fn test_secrets_never_reach_the_sink() {
        let log = test_log().await;
        let secret = "wh_0123456789abcdef0123456789abcdef01234567";

        let request_id = log
            .log_request(json!({ "x-webhook-secret": secret }))
            .await;

        let rows = log.recent(10).await.unwrap();
        let stored = serde_json::to_string(&rows[0].detail).unwrap();
        assert!(!stored.contains(secret));
        assert!(stored.contains("len=43"));
        assert_eq!(rows[0].request_id, request_id);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let log = test_log().await;
        log.log_request(json!({ "a": 1 })).await;
        log.log_request(json!({ "b": 2 })).await;

        let removed = log.clear().await.unwrap();
        assert_eq!(removed, 2);
        assert!(log.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_panic() {
        // Closed connection: the write must degrade, not error.
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        // No migrations: the table does not exist.
        let log = DiagnosticLog::new(db);

        let request_id = log.log_request(json!({ "path": "/webhook/lead" })).await;
        log.log_step(request_id, json!({ "stage": "validated" })).await;
    }
}
