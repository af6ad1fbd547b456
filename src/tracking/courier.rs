//! Courier tracking API client
//!
//! HTTP client for the tracking provider. Registration and fetch are the
//! only two calls the reconciler needs; both are keyed by (courier slug,
//! tracking number) and honor the configured outbound timeout.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Provider error code meaning the tracking is already registered.
const CODE_ALREADY_EXISTS: u64 = 4101;

/// One timestamped tracking status update.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Checkpoint {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub checkpoint_time: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// Tracking state as the provider reports it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TrackingData {
    pub slug: String,
    pub tracking_number: String,
    /// Coarse provider status tag, e.g. `InTransit`.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub expected_delivery: Option<String>,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    tracking: TrackingData,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    meta: ErrorMeta,
}

#[derive(Debug, Deserialize)]
struct ErrorMeta {
    #[serde(default)]
    code: u64,
    #[serde(default)]
    message: String,
}

/// Errors from the courier API.
#[derive(Debug, Error)]
pub enum CourierError {
    #[error("tracking already registered with this courier")]
    AlreadyExists,

    #[error("courier does not recognize this tracking number")]
    NotFound,

    #[error("courier API key is not configured")]
    NotConfigured,

    #[error("courier request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("courier rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// The two courier operations the reconciler depends on.
#[async_trait]
pub trait CourierApi: Send + Sync {
    /// Register a tracking number with a specific courier.
    async fn register(&self, slug: &str, tracking_number: &str)
    -> Result<TrackingData, CourierError>;

    /// Fetch an existing tracking by (slug, tracking number).
    async fn fetch(&self, slug: &str, tracking_number: &str) -> Result<TrackingData, CourierError>;
}

/// HTTP client for the tracking provider.
#[derive(Clone)]
pub struct CourierClient {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl CourierClient {
    pub fn new(
        api_base: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base,
            api_key,
        })
    }

    fn api_key(&self) -> Result<&str, CourierError> {
        self.api_key.as_deref().ok_or(CourierError::NotConfigured)
    }

    async fn parse_error(response: reqwest::Response) -> CourierError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
            if envelope.meta.code == CODE_ALREADY_EXISTS {
                return CourierError::AlreadyExists;
            }
            if status == 404 {
                return CourierError::NotFound;
            }
            return CourierError::Rejected {
                status,
                message: envelope.meta.message,
            };
        }

        if status == 404 {
            return CourierError::NotFound;
        }

        CourierError::Rejected {
            status,
            message: body.chars().take(200).collect(),
        }
    }
}

#[async_trait]
impl CourierApi for CourierClient {
    async fn register(
        &self,
        slug: &str,
        tracking_number: &str,
    ) -> Result<TrackingData, CourierError> {
        let key = self.api_key()?;

        let response = self
            .client
            .post(format!("{}/trackings", self.api_base))
            .header("aftership-api-key", key)
            .json(&serde_json::json!({
                "tracking": {
                    "slug": slug,
                    "tracking_number": tracking_number,
                }
            }))
            .send()
            .await?;

        if response.status().is_success() {
            let envelope: Envelope = response.json().await?;
            return Ok(envelope.data.tracking);
        }

        Err(Self::parse_error(response).await)
    }

    async fn fetch(&self, slug: &str, tracking_number: &str) -> Result<TrackingData, CourierError> {
        let key = self.api_key()?;

        let response = self
            .client
            .get(format!(
                "{}/trackings/{}/{}",
                self.api_base, slug, tracking_number
            ))
            .header("aftership-api-key", key)
            .send()
            .await?;

        if response.status().is_success() {
            let envelope: Envelope = response.json().await?;
            return Ok(envelope.data.tracking);
        }

        Err(Self::parse_error(response).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tracking_body() -> serde_json::Value {
        serde_json::json!({
            "data": {
                "tracking": {
                    "slug": "brt",
                    "tracking_number": "TRK123",
                    "tag": "InTransit",
                    "expected_delivery": "2026-09-01",
                    "checkpoints": [
                        {
                            "message": "Arrived at sorting hub",
                            "location": "Milano",
                            "checkpoint_time": "2026-08-25T10:00:00+02:00",
                            "tag": "InTransit"
                        }
                    ]
                }
            }
        })
    }

    async fn client(server: &MockServer) -> CourierClient {
        CourierClient::new(
            server.uri(),
            Some("test-key".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trackings"))
            .and(header("aftership-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "tracking": { "slug": "brt", "tracking_number": "TRK123" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(tracking_body()))
            .expect(1)
            .mount(&server)
            .await;

        let tracking = client(&server).await.register("brt", "TRK123").await.unwrap();
        assert_eq!(tracking.slug, "brt");
        assert_eq!(tracking.tag.as_deref(), Some("InTransit"));
        assert_eq!(tracking.checkpoints.len(), 1);
    }

    #[tokio::test]
    async fn test_register_already_exists_is_distinguished() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trackings"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "meta": { "code": 4101, "message": "Tracking already exists." }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .register("brt", "TRK123")
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::AlreadyExists));
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trackings/gls/TRK404"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "meta": { "code": 4004, "message": "Tracking does not exist." }
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .await
            .fetch("gls", "TRK404")
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::NotFound));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_request() {
        let client =
            CourierClient::new("http://unused".to_string(), None, Duration::from_secs(5)).unwrap();

        let err = client.register("brt", "TRK123").await.unwrap_err();
        assert!(matches!(err, CourierError::NotConfigured));
    }
}
