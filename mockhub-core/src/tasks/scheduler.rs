// mockhub-core/src/tasks/scheduler.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use mockhub_common::traits::SubscriptionRepository;

use crate::services::VerificationService;
use crate::tasks::hub_maintenance::{spawn_purge_task, spawn_removal_task, spawn_verification_task};

/// What happens to a pass that is mid-flight when the scheduler stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownMode {
    /// Let it finish.
    #[default]
    Graceful,
    /// Drop it. Uncommitted store work is rolled back.
    Abort,
}

/// The three periodic hub jobs, sharing one interval and one shutdown flag.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(
        verification: Arc<VerificationService>,
        repo: Arc<dyn SubscriptionRepository>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = vec![
            spawn_verification_task(verification.clone(), interval, shutdown_rx.clone()),
            spawn_removal_task(verification, interval, shutdown_rx.clone()),
            spawn_purge_task(repo, interval, shutdown_rx),
        ];
        info!("Scheduler started ({} jobs every {:?})", handles.len(), interval);
        Self { shutdown_tx, handles }
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Cancels future passes and stops the jobs. Safe to call more than once.
    pub async fn shutdown(&mut self, mode: ShutdownMode) {
        let _ = self.shutdown_tx.send(true);
        let handles = std::mem::take(&mut self.handles);
        for handle in handles {
            if mode == ShutdownMode::Abort {
                handle.abort();
            }
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!("Scheduler job ended abnormally: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use mockhub_common::models::{Filter, NewSubscription, TopicKind, NO_CLIENT_ID};
    use crate::http::MockHubHttpClient;
    use crate::repositories::SqliteSubscriptionRepository;
    use crate::test_utils::helpers::setup_test_database;
    use crate::Error;

    #[tokio::test]
    async fn test_purge_job_runs_on_its_own() -> Result<(), Error> {
        let (_dir, db) = setup_test_database().await?;
        let repo: Arc<dyn SubscriptionRepository> = Arc::new(SqliteSubscriptionRepository::new(db));
        repo.create_subscription(&NewSubscription {
            callback_url: "http://localhost:9/old".into(),
            secret: "s".into(),
            expires_at: Utc::now() - ChronoDuration::seconds(1),
            created_by_client_id: NO_CLIENT_ID.into(),
            filter: Filter::new(TopicKind::StreamChanged).with("user_id", "1")?,
        })
            .await?;
        // mark it validated so only the purge job can remove it
        let id = repo.get_by_callback("http://localhost:9/old").await?.expect("row").id;
        repo.mark_validated(id).await?;

        let verification = Arc::new(VerificationService::new(
            repo.clone(),
            Arc::new(MockHubHttpClient::new()),
            false,
        ));
        let mut scheduler = Scheduler::start(verification, repo.clone(), Duration::from_millis(20));

        let mut purged = false;
        for _ in 0..100 {
            if repo.count().await? == 0 {
                purged = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        scheduler.shutdown(ShutdownMode::Graceful).await;
        assert!(purged, "expired row was never purged");
        assert!(!scheduler.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() -> Result<(), Error> {
        let (_dir, db) = setup_test_database().await?;
        let repo: Arc<dyn SubscriptionRepository> = Arc::new(SqliteSubscriptionRepository::new(db));
        let verification = Arc::new(VerificationService::new(
            repo.clone(),
            Arc::new(MockHubHttpClient::new()),
            false,
        ));

        let mut scheduler = Scheduler::start(verification, repo, Duration::from_secs(3600));
        scheduler.shutdown(ShutdownMode::Abort).await;
        scheduler.shutdown(ShutdownMode::Graceful).await;
        assert!(!scheduler.is_running());
        Ok(())
    }
}
