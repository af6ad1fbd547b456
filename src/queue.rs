//! # Notification Dispatch Queue
//!
//! Background worker that sweeps the notification queue on a fixed tick.
//! Each sweep first returns stale `processing` claims to `pending`, then
//! claims a bounded batch of the oldest pending jobs under a unique claim
//! token and delivers them through the configured transport.
//!
//! Delivery failures charge an attempt; a job converges to `failed` once
//! its ceiling is reached and is never retried again. The worker holds no
//! in-process queue state, so multiple instances can sweep the same table
//! without double-processing.

use std::sync::Arc;

use metrics::{counter, gauge, histogram};
use sea_orm::{DatabaseConnection, EntityTrait};
use tokio::time::{Duration as TokioDuration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{notification_job, order, tenant};
use crate::notify::{NotificationMessage, NotificationTransport, TransportError, format_order_message};
use crate::repositories::NotificationJobRepository;

/// Background notification worker.
pub struct NotificationWorker {
    config: Arc<AppConfig>,
    db: DatabaseConnection,
    repo: NotificationJobRepository,
    transport: Arc<dyn NotificationTransport>,
    worker_name: String,
}

/// Outcome counters for one queue sweep.
#[derive(Debug, Default)]
pub struct SweepStats {
    pub reclaimed: u64,
    pub claimed: u64,
    pub delivered: u64,
    pub retried: u64,
    pub failed_terminally: u64,
}

impl NotificationWorker {
    pub fn new(
        config: Arc<AppConfig>,
        db: DatabaseConnection,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        let repo = NotificationJobRepository::new(db.clone());
        Self {
            config,
            db,
            repo,
            transport,
            worker_name: format!("notify-{}", &Uuid::new_v4().to_string()[..8]),
        }
    }

    /// Run the sweep loop until the shutdown token fires.
    #[instrument(skip_all, fields(worker = %self.worker_name))]
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting notification worker");
        let tick_interval = TokioDuration::from_secs(self.config.queue.tick_interval_seconds);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Notification worker shutdown requested");
                    break;
                }
                _ = sleep(tick_interval) => {
                    let sweep_started = Instant::now();
                    match self.sweep().await {
                        Ok(stats) => {
                            debug!(
                                reclaimed = stats.reclaimed,
                                claimed = stats.claimed,
                                delivered = stats.delivered,
                                retried = stats.retried,
                                failed = stats.failed_terminally,
                                "Queue sweep completed"
                            );
                        }
                        Err(err) => {
                            error!(error = ?err, "Queue sweep failed");
                        }
                    }
                    histogram!("notification_sweep_duration_ms")
                        .record(sweep_started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Notification worker stopped");
    }

    /// One queue sweep: reclaim, claim, deliver.
    pub async fn sweep(&self) -> Result<SweepStats, sea_orm::DbErr> {
        let mut stats = SweepStats::default();

        let cutoff = chrono::Utc::now()
            - chrono::Duration::seconds(self.config.queue.reclaim_after_seconds as i64);
        stats.reclaimed = self.repo.reclaim_stale(cutoff).await?;
        if stats.reclaimed > 0 {
            warn!(reclaimed = stats.reclaimed, "Reclaimed stale processing claims");
            counter!("notification_jobs_reclaimed_total").increment(stats.reclaimed);
        }

        // Unique per sweep so claimed rows are unambiguous even when the
        // same worker crashes mid-sweep and restarts.
        let claim_token = format!("{}-{}", self.worker_name, Uuid::new_v4());
        let batch = self
            .repo
            .claim_batch(&claim_token, self.config.queue.batch_size)
            .await?;
        stats.claimed = batch.len() as u64;

        for job in batch {
            self.dispatch(job, &mut stats).await?;
        }

        if let Ok(pending) = self.repo.pending_count().await {
            gauge!("notification_jobs_pending").set(pending as f64);
        }

        Ok(stats)
    }

    async fn dispatch(
        &self,
        job: notification_job::Model,
        stats: &mut SweepStats,
    ) -> Result<(), sea_orm::DbErr> {
        let job_id = job.id;

        match self.build_message(&job).await {
            Ok(message) => match self.transport.deliver(&message).await {
                Ok(()) => {
                    self.repo.complete(job).await?;
                    stats.delivered += 1;
                    counter!("notification_jobs_delivered_total").increment(1);
                }
                Err(err) => {
                    self.record_failure(job, &err.to_string(), stats).await?;
                    warn!(%job_id, error = %err, "Notification delivery failed");
                }
            },
            Err(reason) => {
                // Missing order/tenant/destination rows cannot heal on
                // retry any faster than the attempt ceiling allows.
                self.record_failure(job, &reason, stats).await?;
                warn!(%job_id, reason, "Notification job is undeliverable");
            }
        }

        Ok(())
    }

    async fn record_failure(
        &self,
        job: notification_job::Model,
        error: &str,
        stats: &mut SweepStats,
    ) -> Result<(), sea_orm::DbErr> {
        let updated = self.repo.record_failure(job, error).await?;
        if updated.status == notification_job::status::FAILED {
            stats.failed_terminally += 1;
            counter!("notification_jobs_failed_total").increment(1);
        } else {
            stats.retried += 1;
            counter!("notification_jobs_retried_total").increment(1);
        }
        Ok(())
    }

    async fn build_message(
        &self,
        job: &notification_job::Model,
    ) -> Result<NotificationMessage, String> {
        let order = order::Entity::find_by_id(job.order_id)
            .one(&self.db)
            .await
            .map_err(|e| format!("order lookup failed: {e}"))?
            .ok_or_else(|| format!("order {} no longer exists", job.order_id))?;

        let tenant = tenant::Entity::find_by_id(job.tenant_id)
            .one(&self.db)
            .await
            .map_err(|e| format!("tenant lookup failed: {e}"))?
            .ok_or_else(|| format!("tenant {} no longer exists", job.tenant_id))?;

        let destination = tenant
            .notify_chat_id
            .ok_or_else(|| TransportError::NoDestination.to_string())?;

        let platform = crate::models::integration::Entity::find_by_id(order.integration_id)
            .one(&self.db)
            .await
            .map_err(|e| format!("integration lookup failed: {e}"))?
            .map(|i| i.platform)
            .unwrap_or_else(|| "unknown".to_string());

        Ok(NotificationMessage {
            destination,
            text: format_order_message(
                &order.external_order_id,
                &order.status,
                order.total,
                &order.currency,
                &platform,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification_job::status;
    use crate::notify::TransportError;
    use crate::repositories::order::{NewOrder, OrderRepository};
    use crate::secrets::SecretRegistry;
    use async_trait::async_trait;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveModelTrait, Database, Set};
    use std::sync::Mutex;

    /// Transport test double recording every delivery.
    struct RecordingTransport {
        delivered: Mutex<Vec<NotificationMessage>>,
        fail: bool,
    }

    impl RecordingTransport {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl NotificationTransport for RecordingTransport {
        async fn deliver(&self, message: &NotificationMessage) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Rejected {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            self.delivered.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    async fn test_fixture(
        transport: Arc<dyn NotificationTransport>,
    ) -> (NotificationWorker, NotificationJobRepository, Uuid, Uuid) {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        Migrator::up(&db, None).await.expect("Migrations failed");

        let registry = SecretRegistry::new(db.clone());
        let tenant = registry.issue_tenant(None).await.unwrap();

        // Give the tenant a destination.
        let mut active: tenant::ActiveModel = tenant.clone().into();
        active.notify_chat_id = Set(Some("-100123456".to_string()));
        active.update(&db).await.unwrap();

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
                    total: 49.9,
                    currency: "EUR".to_string(),
                    tracking_number: None,
                    placed_at: None,
                    items: Vec::new(),
                },
            )
            .await
            .unwrap();

        let config = Arc::new(AppConfig {
            profile: "test".to_string(),
            ..AppConfig::default()
        });
        let repo = NotificationJobRepository::new(db.clone());
        let worker = NotificationWorker::new(config, db, transport);

        (worker, repo, tenant.id, order.id)
    }

    #[tokio::test]
    async fn test_sweep_delivers_pending_jobs() {
        let transport = RecordingTransport::new(false);
        let (worker, repo, tenant_id, order_id) = test_fixture(transport.clone()).await;

        let job = repo.enqueue(tenant_id, order_id, 3).await.unwrap();

        let stats = worker.sweep().await.unwrap();
        assert_eq!(stats.claimed, 1);
        assert_eq!(stats.delivered, 1);

        let job = repo.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, status::COMPLETED);

        let delivered = transport.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].destination, "-100123456");
        assert!(delivered[0].text.contains("#1001"));
        assert!(delivered[0].text.contains("shopify"));
    }

    #[tokio::test]
    async fn test_always_failing_job_converges_to_failed() {
        let transport = RecordingTransport::new(true);
        let (worker, repo, tenant_id, order_id) = test_fixture(transport).await;

        let job = repo.enqueue(tenant_id, order_id, 3).await.unwrap();

        for expected_attempts in 1..=3 {
            let stats = worker.sweep().await.unwrap();
            assert_eq!(stats.claimed, 1);
            let job = repo.find_by_id(job.id).await.unwrap().unwrap();
            assert_eq!(job.attempts, expected_attempts);
        }

        let job = repo.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, status::FAILED);

        // A fourth sweep finds nothing.
        let stats = worker.sweep().await.unwrap();
        assert_eq!(stats.claimed, 0);
    }

    #[tokio::test]
    async fn test_sweep_batch_is_bounded() {
        let transport = RecordingTransport::new(false);
        let (worker, repo, tenant_id, order_id) = test_fixture(transport).await;

        for _ in 0..15 {
            repo.enqueue(tenant_id, order_id, 3).await.unwrap();
        }

        let stats = worker.sweep().await.unwrap();
        assert_eq!(stats.claimed, 10);
        assert_eq!(repo.pending_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancellation() {
        let transport = RecordingTransport::new(false);
        let (worker, _repo, _tenant_id, _order_id) = test_fixture(transport).await;

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(TokioDuration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .expect("worker task panicked");
    }
}
