//! Periodic expiry sweep.
//!
//! Each tick reports newly overdue tasks to their owners, then deletes
//! EXPIRED notifications past their retention and old read notifications.
//! Steps are independent: a failing step is logged and the rest still run,
//! and the next tick starts from scratch. All deletes are idempotent.
//!
//! Only one sweeper may run against a database; there is no cross-process lock.

use std::time::Duration;

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::SweeperConfig;
use crate::db::{NotificationRepository, NotificationType, TaskRepository};
use crate::error::AppError;
use crate::services::notifications::NotificationDispatcher;

const OVERDUE_BATCH: i64 = 500;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub overdue_notified: usize,
    pub expired_deleted: u64,
    pub read_deleted: u64,
}

fn retention(days: i64) -> Option<chrono::Duration> {
    chrono::Duration::try_days(days)
}

pub struct ExpirySweeper {
    pool: SqlitePool,
    dispatcher: NotificationDispatcher,
    interval: Duration,
    /// `None` when the configured window does not fit a duration; the step is skipped.
    expired_retention: Option<chrono::Duration>,
    read_retention: Option<chrono::Duration>,
}

impl ExpirySweeper {
    pub fn new(pool: SqlitePool, dispatcher: NotificationDispatcher, config: &SweeperConfig) -> Self {
        Self {
            pool,
            dispatcher,
            interval: Duration::from_secs(config.interval_seconds.max(1)),
            expired_retention: retention(config.expired_retention_days.max(0)),
            read_retention: if config.read_retention_days > 0 {
                retention(config.read_retention_days)
            } else {
                None
            },
        }
    }

    /// Run the sweep loop until `shutdown` fires. The first tick runs immediately.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                "Starting expiry sweeper with interval {:?}, EXPIRED retention {:?} days",
                self.interval,
                self.expired_retention.map(|r| r.num_days())
            );

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        tracing::info!("Expiry sweeper shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let now = chrono::Utc::now().naive_utc();
                        let report = self.sweep_once(now).await;
                        tracing::info!(
                            "Expiry sweep finished: {} overdue notified, {} expired deleted, {} read deleted",
                            report.overdue_notified,
                            report.expired_deleted,
                            report.read_deleted
                        );
                    }
                }
            }
        })
    }

    /// One sweep as of `now`. Never fails; step errors are logged.
    pub async fn sweep_once(&self, now: NaiveDateTime) -> SweepReport {
        let mut report = SweepReport::default();

        match TaskRepository::find_overdue_unnotified(&self.pool, now, OVERDUE_BATCH).await {
            Ok(tasks) => {
                for task in tasks {
                    match self.dispatcher.notify_expired(&task).await {
                        Ok(_) => {
                            if let Err(e) =
                                TaskRepository::mark_expired_notified(&self.pool, &task.id).await
                            {
                                tracing::warn!(
                                    "Failed to flag task {} as reported overdue: {:?}",
                                    task.id,
                                    e
                                );
                                continue;
                            }
                            report.overdue_notified += 1;
                        }
                        // Owner is gone: nobody to tell, so stop picking the task up.
                        Err(AppError::NotFound(_)) => {
                            tracing::warn!("Overdue task {} has no owner, flagging it", task.id);
                            if let Err(e) =
                                TaskRepository::mark_expired_notified(&self.pool, &task.id).await
                            {
                                tracing::warn!("Failed to flag task {}: {:?}", task.id, e);
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Failed to notify overdue task {}: {:?}", task.id, e)
                        }
                    }
                }
            }
            Err(e) => tracing::warn!("Failed to query overdue tasks: {:?}", e),
        }

        match self.expired_retention.and_then(|r| now.checked_sub_signed(r)) {
            Some(cutoff) => match NotificationRepository::delete_by_type_older_than(
                &self.pool,
                NotificationType::Expired,
                cutoff,
            )
            .await
            {
                Ok(n) => report.expired_deleted = n,
                Err(e) => tracing::warn!("Failed to delete expired notifications: {:?}", e),
            },
            None => tracing::warn!("EXPIRED retention out of range, skipping its cleanup"),
        }

        if let Some(retention) = self.read_retention {
            match now.checked_sub_signed(retention) {
                Some(cutoff) => {
                    match NotificationRepository::delete_read_older_than(&self.pool, cutoff).await {
                        Ok(n) => report.read_deleted = n,
                        Err(e) => {
                            tracing::warn!("Failed to delete old read notifications: {:?}", e)
                        }
                    }
                }
                None => tracing::warn!("Read retention out of range, skipping its cleanup"),
            }
        }

        report
    }
}
