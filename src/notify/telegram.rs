//! Telegram notification transport
//!
//! Delivers messages through the Bot API `sendMessage` method. Every call
//! carries the configured outbound timeout so a slow Telegram endpoint can
//! never pin a queue sweep.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{NotificationMessage, NotificationTransport, TransportError};

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Transport backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    api_base: String,
    bot_token: Option<String>,
}

impl TelegramTransport {
    /// Build a transport. `bot_token` being `None` leaves the transport
    /// unconfigured; deliveries then fail with `NotConfigured`.
    pub fn new(
        api_base: String,
        bot_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base,
            bot_token,
        })
    }
}

#[async_trait]
impl NotificationTransport for TelegramTransport {
    async fn deliver(&self, message: &NotificationMessage) -> Result<(), TransportError> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or(TransportError::NotConfigured)?;

        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let response = self
            .client
            .post(&url)
            .json(&SendMessageRequest {
                chat_id: &message.destination,
                text: &message.text,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> NotificationMessage {
        NotificationMessage {
            destination: "-100123456".to_string(),
            text: "New order #1001".to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "-100123456",
                "text": "New order #1001"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = TelegramTransport::new(
            server.uri(),
            Some("test-token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        transport.deliver(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_delivery_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&server)
            .await;

        let transport = TelegramTransport::new(
            server.uri(),
            Some("test-token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = transport.deliver(&message()).await.unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_unconfigured_transport_fails_fast() {
        let transport =
            TelegramTransport::new("http://unused".to_string(), None, Duration::from_secs(5))
                .unwrap();

        let err = transport.deliver(&message()).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConfigured));
    }
}
