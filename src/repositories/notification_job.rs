//! Notification job repository
//!
//! Claim-based queue operations. A sweep claims a bounded batch of oldest
//! pending jobs by stamping them `processing` with a unique claim token, so
//! concurrent workers can never double-process a row. Claims that outlive
//! the reclaim window (a crashed worker) are swept back to `pending`.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::models::notification_job::{self, status};

/// Repository for notification queue operations
#[derive(Debug, Clone)]
pub struct NotificationJobRepository {
    db: DatabaseConnection,
}

impl NotificationJobRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Enqueue a notification for an order. One cheap row insert; dispatch
    /// happens asynchronously in the worker.
    pub async fn enqueue(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        max_attempts: i32,
    ) -> Result<notification_job::Model, sea_orm::DbErr> {
        let now = chrono::Utc::now().into();
        let row = notification_job::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            order_id: Set(order_id),
            status: Set(status::PENDING.to_string()),
            attempts: Set(0),
            max_attempts: Set(max_attempts),
            claimed_by: Set(None),
            claimed_at: Set(None),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        row.insert(&self.db).await
    }

    /// Claim up to `batch_size` of the oldest pending jobs for this sweep.
    ///
    /// The claim token is unique per sweep; the guarded update only flips
    /// rows that are still `pending`, so a row claimed by a concurrent
    /// worker between the select and the update is simply skipped.
    pub async fn claim_batch(
        &self,
        claim_token: &str,
        batch_size: u64,
    ) -> Result<Vec<notification_job::Model>, sea_orm::DbErr> {
        let candidates: Vec<Uuid> = notification_job::Entity::find()
            .filter(notification_job::Column::Status.eq(status::PENDING))
            .order_by_asc(notification_job::Column::CreatedAt)
            .limit(batch_size)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|job| job.id)
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let now: DateTime<Utc> = chrono::Utc::now();
        notification_job::Entity::update_many()
            .col_expr(
                notification_job::Column::Status,
                Expr::value(status::PROCESSING),
            )
            .col_expr(notification_job::Column::ClaimedBy, Expr::value(claim_token))
            .col_expr(notification_job::Column::ClaimedAt, Expr::value(now))
            .col_expr(notification_job::Column::UpdatedAt, Expr::value(now))
            .filter(notification_job::Column::Id.is_in(candidates))
            .filter(notification_job::Column::Status.eq(status::PENDING))
            .exec(&self.db)
            .await?;

        notification_job::Entity::find()
            .filter(notification_job::Column::ClaimedBy.eq(claim_token))
            .filter(notification_job::Column::Status.eq(status::PROCESSING))
            .order_by_asc(notification_job::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    /// Mark a claimed job delivered.
    pub async fn complete(
        &self,
        job: notification_job::Model,
    ) -> Result<notification_job::Model, sea_orm::DbErr> {
        let mut active: notification_job::ActiveModel = job.into();
        active.status = Set(status::COMPLETED.to_string());
        active.claimed_by = Set(None);
        active.claimed_at = Set(None);
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(&self.db).await
    }

    /// Record a failed attempt: back to `pending` for a later sweep, or
    /// terminally `failed` once the attempt ceiling is reached.
    pub async fn record_failure(
        &self,
        job: notification_job::Model,
        error: &str,
    ) -> Result<notification_job::Model, sea_orm::DbErr> {
        let attempts = job.attempts + 1;
        let exhausted = attempts >= job.max_attempts;

        let mut active: notification_job::ActiveModel = job.into();
        active.attempts = Set(attempts);
        active.status = Set(if exhausted {
            status::FAILED.to_string()
        } else {
            status::PENDING.to_string()
        });
        active.claimed_by = Set(None);
        active.claimed_at = Set(None);
        active.last_error = Set(Some(error.to_string()));
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(&self.db).await
    }

    /// Return `processing` jobs whose claim is older than the cutoff to
    /// `pending`, without charging an attempt. Returns the reclaimed count.
    pub async fn reclaim_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, sea_orm::DbErr> {
        let result = notification_job::Entity::update_many()
            .col_expr(notification_job::Column::Status, Expr::value(status::PENDING))
            .col_expr(
                notification_job::Column::ClaimedBy,
                Expr::value(sea_orm::Value::String(None)),
            )
            .col_expr(
                notification_job::Column::ClaimedAt,
                Expr::value(sea_orm::Value::ChronoDateTimeWithTimeZone(None)),
            )
            .col_expr(
                notification_job::Column::UpdatedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(notification_job::Column::Status.eq(status::PROCESSING))
            .filter(notification_job::Column::ClaimedAt.lt(cutoff))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn find_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<notification_job::Model>, sea_orm::DbErr> {
        notification_job::Entity::find_by_id(id).one(&self.db).await
    }

    /// Count of jobs currently waiting for a sweep.
    pub async fn pending_count(&self) -> Result<u64, sea_orm::DbErr> {
        notification_job::Entity::find()
            .filter(notification_job::Column::Status.eq(status::PENDING))
            .count(&self.db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::order::{NewOrder, OrderRepository};
    use crate::secrets::SecretRegistry;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn test_fixture() -> (DatabaseConnection, Uuid, Uuid) {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        Migrator::up(&db, None).await.expect("Migrations failed");

        let registry = SecretRegistry::new(db.clone());
        let tenant = registry.issue_tenant(None).await.unwrap();
        let integration = registry
            .issue_integration(tenant.id, "shopify", None)
            .await
            .unwrap();

        let (order, _) = OrderRepository::new(db.clone())
            .upsert(
                integration.id,
                NewOrder {
                    external_order_id: "1001".to_string(),
                    customer_id: None,
                    status: "pending".to_string(),
                    total: 10.0,
                    currency: "EUR".to_string(),
                    tracking_number: None,
                    placed_at: None,
                    items: Vec::new(),
                },
            )
            .await
            .unwrap();

        (db, tenant.id, order.id)
    }

    #[tokio::test]
    async fn test_claim_respects_batch_size_and_age_order() {
        let (db, tenant_id, order_id) = test_fixture().await;
        let repo = NotificationJobRepository::new(db);

        let mut enqueued = Vec::new();
        for _ in 0..5 {
            enqueued.push(repo.enqueue(tenant_id, order_id, 3).await.unwrap());
            // Distinct created_at values so ordering is deterministic.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let claimed = repo.claim_batch("sweep-1", 3).await.unwrap();
        assert_eq!(claimed.len(), 3);
        assert_eq!(claimed[0].id, enqueued[0].id);
        assert!(claimed.iter().all(|j| j.status == status::PROCESSING));
        assert!(claimed.iter().all(|j| j.claimed_by.as_deref() == Some("sweep-1")));

        assert_eq!(repo.pending_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_never_share_a_job() {
        let (db, tenant_id, order_id) = test_fixture().await;
        let repo = NotificationJobRepository::new(db);

        for _ in 0..4 {
            repo.enqueue(tenant_id, order_id, 3).await.unwrap();
        }

        let first = repo.claim_batch("sweep-a", 10).await.unwrap();
        let second = repo.claim_batch("sweep-b", 10).await.unwrap();

        assert_eq!(first.len(), 4);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_failure_path_converges_to_failed_after_max_attempts() {
        let (db, tenant_id, order_id) = test_fixture().await;
        let repo = NotificationJobRepository::new(db);

        let mut job = repo.enqueue(tenant_id, order_id, 3).await.unwrap();

        for attempt in 1..=3 {
            let claimed = repo
                .claim_batch(&format!("sweep-{attempt}"), 10)
                .await
                .unwrap();
            assert_eq!(claimed.len(), 1, "attempt {attempt} found no job");
            job = repo
                .record_failure(claimed.into_iter().next().unwrap(), "delivery refused")
                .await
                .unwrap();
            assert_eq!(job.attempts, attempt);
        }

        assert_eq!(job.status, status::FAILED);
        assert_eq!(job.last_error.as_deref(), Some("delivery refused"));

        // A fourth sweep finds nothing to retry.
        let claimed = repo.claim_batch("sweep-4", 10).await.unwrap();
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn test_complete_clears_claim() {
        let (db, tenant_id, order_id) = test_fixture().await;
        let repo = NotificationJobRepository::new(db);

        repo.enqueue(tenant_id, order_id, 3).await.unwrap();
        let claimed = repo.claim_batch("sweep-1", 10).await.unwrap();

        let done = repo
            .complete(claimed.into_iter().next().unwrap())
            .await
            .unwrap();
        assert_eq!(done.status, status::COMPLETED);
        assert!(done.claimed_by.is_none());
        assert!(done.claimed_at.is_none());
    }

    #[tokio::test]
    async fn test_stale_claims_are_reclaimed_without_charging_attempts() {
        let (db, tenant_id, order_id) = test_fixture().await;
        let repo = NotificationJobRepository::new(db);

        repo.enqueue(tenant_id, order_id, 3).await.unwrap();
        repo.claim_batch("crashed-worker", 10).await.unwrap();

        // Cutoff in the future makes the fresh claim count as stale.
        let reclaimed = repo
            .reclaim_stale(chrono::Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(reclaimed, 1);

        let claimed = repo.claim_batch("sweep-2", 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_fresh_claims_survive_reclaim_sweep() {
        let (db, tenant_id, order_id) = test_fixture().await;
        let repo = NotificationJobRepository::new(db);

        repo.enqueue(tenant_id, order_id, 3).await.unwrap();
        repo.claim_batch("live-worker", 10).await.unwrap();

        let reclaimed = repo
            .reclaim_stale(chrono::Utc::now() - chrono::Duration::seconds(300))
            .await
            .unwrap();
        assert_eq!(reclaimed, 0);
    }
}
