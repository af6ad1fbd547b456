//! # Webhook Secret Registry
//!
//! Issues and resolves the shared secrets that authenticate inbound
//! webhooks. Secrets use the format `wh_<40 lowercase hex>` (20 random
//! bytes), are unique across tenants and integrations respectively, and are
//! compared in constant time to prevent timing attacks.
//!
//! Order webhooks can additionally carry an HMAC-SHA256 signature
//! (`X-Shopify-Hmac-Sha256`, base64); when present it is verified against
//! the integration secret before the payload is trusted.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{integration, tenant};

type HmacSha256 = Hmac<Sha256>;

/// Prefix shared by every issued webhook secret.
pub const SECRET_PREFIX: &str = "wh_";

/// Hex characters following the prefix (20 random bytes).
pub const SECRET_HEX_LEN: usize = 40;

const ISSUE_MAX_RETRIES: u32 = 5;

/// Errors that can occur while issuing or verifying secrets.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to issue a unique secret after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("signature header is not valid base64")]
    SignatureMalformed,

    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
}

/// Generate a fresh webhook secret: `wh_` followed by 40 lowercase hex chars.
pub fn generate_webhook_secret() -> String {
    let mut bytes = [0u8; SECRET_HEX_LEN / 2];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", SECRET_PREFIX, hex::encode(bytes))
}

/// Check that a candidate string has the issued-secret shape.
///
/// Malformed candidates are rejected before any database lookup happens, so
/// garbage input never costs a query.
pub fn is_valid_secret_format(candidate: &str) -> bool {
    let Some(hex_part) = candidate.strip_prefix(SECRET_PREFIX) else {
        return false;
    };

    hex_part.len() == SECRET_HEX_LEN
        && hex_part
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Registry over the tenant and integration secret columns.
#[derive(Clone)]
pub struct SecretRegistry {
    db: DatabaseConnection,
}

impl SecretRegistry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Issue a new tenant with a freshly generated secret.
    ///
    /// Collisions on the unique secret column are retried with a new secret
    /// up to a small bound; the 160-bit space makes more than one retry
    /// vanishingly unlikely.
    pub async fn issue_tenant(&self, name: Option<String>) -> Result<tenant::Model, SecretError> {
        for _ in 0..ISSUE_MAX_RETRIES {
            let now = chrono::Utc::now().into();
            let candidate = tenant::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(name.clone()),
                webhook_secret: Set(generate_webhook_secret()),
                notify_chat_id: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            };

            match candidate.insert(&self.db).await {
                Ok(model) => return Ok(model),
                Err(err) if is_secret_collision(&err) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(SecretError::Exhausted {
            attempts: ISSUE_MAX_RETRIES,
        })
    }

    /// Issue a new integration for a tenant with a freshly generated secret.
    pub async fn issue_integration(
        &self,
        tenant_id: Uuid,
        platform: &str,
        shop_domain: Option<String>,
    ) -> Result<integration::Model, SecretError> {
        for _ in 0..ISSUE_MAX_RETRIES {
            let now = chrono::Utc::now().into();
            let candidate = integration::ActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(tenant_id),
                platform: Set(platform.to_string()),
                shop_domain: Set(shop_domain.clone()),
                access_token: Set(None),
                webhook_secret: Set(generate_webhook_secret()),
                active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
            };

            match candidate.insert(&self.db).await {
                Ok(model) => return Ok(model),
                Err(err) if is_secret_collision(&err) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(SecretError::Exhausted {
            attempts: ISSUE_MAX_RETRIES,
        })
    }

    /// Rotate the secret of an existing integration, returning the new value.
    pub async fn rotate_integration_secret(
        &self,
        integration: integration::Model,
    ) -> Result<integration::Model, SecretError> {
        for _ in 0..ISSUE_MAX_RETRIES {
            let mut active: integration::ActiveModel = integration.clone().into();
            active.webhook_secret = Set(generate_webhook_secret());
            active.updated_at = Set(chrono::Utc::now().into());

            match active.update(&self.db).await {
                Ok(model) => return Ok(model),
                Err(err) if is_secret_collision(&err) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(SecretError::Exhausted {
            attempts: ISSUE_MAX_RETRIES,
        })
    }

    /// Resolve a tenant from a presented secret.
    ///
    /// Returns `None` for malformed secrets, unknown secrets, or any
    /// mismatch; callers map all of those to the same 401 so the response
    /// does not leak which case occurred.
    pub async fn resolve_tenant(
        &self,
        presented: &str,
    ) -> Result<Option<tenant::Model>, SecretError> {
        if !is_valid_secret_format(presented) {
            return Ok(None);
        }

        let found = tenant::Entity::find()
            .filter(tenant::Column::WebhookSecret.eq(presented))
            .one(&self.db)
            .await?;

        // Re-compare in constant time; the index lookup alone is not
        // timing-safe.
        Ok(found.filter(|t| {
            bool::from(ConstantTimeEq::ct_eq(
                t.webhook_secret.as_bytes(),
                presented.as_bytes(),
            ))
        }))
    }

    /// Resolve an active integration from a presented secret.
    ///
    /// Inactive integrations resolve to `None` even when the secret matches.
    pub async fn resolve_integration(
        &self,
        presented: &str,
    ) -> Result<Option<integration::Model>, SecretError> {
        if !is_valid_secret_format(presented) {
            return Ok(None);
        }

        let found = integration::Entity::find()
            .filter(integration::Column::WebhookSecret.eq(presented))
            .filter(integration::Column::Active.eq(true))
            .one(&self.db)
            .await?;

        Ok(found.filter(|i| {
            bool::from(ConstantTimeEq::ct_eq(
                i.webhook_secret.as_bytes(),
                presented.as_bytes(),
            ))
        }))
    }
}

fn is_secret_collision(err: &sea_orm::DbErr) -> bool {
    // Secret issuance only inserts/updates the secret column, so any unique
    // violation here is a secret collision.
    matches!(
        err,
        sea_orm::DbErr::Query(sea_orm::RuntimeErr::SqlxError(sqlx))
        | sea_orm::DbErr::Exec(sea_orm::RuntimeErr::SqlxError(sqlx))
            if sqlx
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation())
    )
}

/// Verify a base64 HMAC-SHA256 signature over the raw request body.
pub fn verify_hmac_signature(
    body: &[u8],
    signature_b64: &str,
    secret: &str,
) -> Result<(), SecretError> {
    let expected = BASE64
        .decode(signature_b64.trim())
        .map_err(|_| SecretError::SignatureMalformed)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SecretError::SignatureInvalid)?;
    mac.update(body);

    // verify_slice performs a constant-time comparison internally.
    mac.verify_slice(&expected)
        .map_err(|_| SecretError::SignatureInvalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        Migrator::up(&db, None).await.expect("Migrations failed");
        db
    }

    #[test]
    fn test_generated_secret_format() {
        let secret = generate_webhook_secret();
        assert!(is_valid_secret_format(&secret));
        assert_eq!(secret.len(), SECRET_PREFIX.len() + SECRET_HEX_LEN);
    }

    #[test]
    fn test_generated_secrets_are_unique() {
        let a = generate_webhook_secret();
        let b = generate_webhook_secret();
        assert_ne!(a, b);
    }

    #[test]
    fn test_format_validation_rejects_garbage() {
        assert!(!is_valid_secret_format(""));
        assert!(!is_valid_secret_format("wh_"));
        assert!(!is_valid_secret_format("wh_short"));
        // Uppercase hex is not issued, so it is not accepted.
        assert!(!is_valid_secret_format(&format!(
            "wh_{}",
            "A".repeat(SECRET_HEX_LEN)
        )));
        // Right length, wrong alphabet.
        assert!(!is_valid_secret_format(&format!(
            "wh_{}",
            "z".repeat(SECRET_HEX_LEN)
        )));
        // Missing prefix.
        assert!(!is_valid_secret_format(&"a".repeat(
            SECRET_PREFIX.len() + SECRET_HEX_LEN
        )));
    }

    #[tokio::test]
    async fn test_issue_and_resolve_tenant() {
        let db = test_db().await;
        let registry = SecretRegistry::new(db);

        let tenant = registry
            .issue_tenant(Some("Acme".to_string()))
            .await
            .expect("Failed to issue tenant");
        assert!(is_valid_secret_format(&tenant.webhook_secret));

        let resolved = registry
            .resolve_tenant(&tenant.webhook_secret)
            .await
            .expect("Resolve failed");
        assert_eq!(resolved.map(|t| t.id), Some(tenant.id));
    }

    #[tokio::test]
    async fn test_unknown_secret_resolves_to_none() {
        let db = test_db().await;
        let registry = SecretRegistry::new(db);

        let resolved = registry
            .resolve_tenant(&generate_webhook_secret())
            .await
            .expect("Resolve failed");
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_malformed_secret_resolves_to_none() {
        let db = test_db().await;
        let registry = SecretRegistry::new(db);

        let resolved = registry
            .resolve_tenant("not-a-secret")
            .await
            .expect("Resolve failed");
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_secret_resolves_only_its_own_tenant() {
        let db = test_db().await;
        let registry = SecretRegistry::new(db);

        let tenant_a = registry.issue_tenant(Some("A".to_string())).await.unwrap();
        let tenant_b = registry.issue_tenant(Some("B".to_string())).await.unwrap();

        let resolved = registry
            .resolve_tenant(&tenant_a.webhook_secret)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, tenant_a.id);
        assert_ne!(resolved.id, tenant_b.id);
    }

    #[tokio::test]
    async fn test_inactive_integration_does_not_resolve() {
        let db = test_db().await;
        let registry = SecretRegistry::new(db.clone());

        let tenant = registry.issue_tenant(None).await.unwrap();
        let integration = registry
            .issue_integration(tenant.id, "shopify", Some("acme.myshopify.com".to_string()))
            .await
            .unwrap();

        let resolved = registry
            .resolve_integration(&integration.webhook_secret)
            .await
            .unwrap();
        assert!(resolved.is_some());

        let mut active: integration::ActiveModel = resolved.unwrap().into();
        active.active = Set(false);
        active.update(&db).await.unwrap();

        let resolved = registry
            .resolve_integration(&integration.webhook_secret)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn test_rotated_secret_replaces_the_old_one() {
        let db = test_db().await;
        let registry = SecretRegistry::new(db);

        let tenant = registry.issue_tenant(None).await.unwrap();
        let integration = registry
            .issue_integration(tenant.id, "woocommerce", None)
            .await
            .unwrap();
        let old_secret = integration.webhook_secret.clone();

        let rotated = registry
            .rotate_integration_secret(integration)
            .await
            .expect("Rotation failed");
        assert_ne!(rotated.webhook_secret, old_secret);
        assert!(is_valid_secret_format(&rotated.webhook_secret));

        let resolved = registry
            .resolve_integration(&rotated.webhook_secret)
            .await
            .unwrap();
        assert_eq!(resolved.map(|i| i.id), Some(rotated.id));

        let stale = registry.resolve_integration(&old_secret).await.unwrap();
        assert!(stale.is_none());
    }

    #[test]
    fn test_hmac_signature_roundtrip() {
        let secret = "wh_0123456789abcdef0123456789abcdef01234567";
        let body = br#"{"order_id":"1001"}"#;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let signature = BASE64.encode(mac.finalize().into_bytes());

        assert!(verify_hmac_signature(body, &signature, secret).is_ok());
    }

    #[test]
    fn test_hmac_signature_rejects_tampered_body() {
        let secret = "wh_0123456789abcdef0123456789abcdef01234567";
        let body = br#"{"order_id":"1001"}"#;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let signature = BASE64.encode(mac.finalize().into_bytes());

        let tampered = br#"{"order_id":"9999"}"#;
        assert!(matches!(
            verify_hmac_signature(tampered, &signature, secret),
            Err(SecretError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_hmac_signature_rejects_bad_base64() {
        assert!(matches!(
            verify_hmac_signature(b"body", "!!not-base64!!", "secret"),
            Err(SecretError::SignatureMalformed)
        ));
    }
}
