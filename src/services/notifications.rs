//! Notification dispatcher: persists in-app notifications and pushes them to
//! the recipient's live channel.
//!
//! Persistence comes first. A push that finds nobody connected is not an
//! error: the client picks the record up from the REST listing on its next
//! connect or poll.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db::{
    CreateNotification, Notification, NotificationRepository, NotificationType, SubjectKind, Task,
    UserRepository,
};
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::services::realtime::{Channel, RealtimeChannel, RealtimeEvent};
use crate::AppState;

#[derive(Clone)]
pub struct NotificationDispatcher {
    pool: SqlitePool,
    channel: Arc<dyn RealtimeChannel>,
}

/// One page of a user's notifications.
#[derive(Debug)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub total: i64,
}

impl NotificationDispatcher {
    pub fn new(pool: SqlitePool, channel: Arc<dyn RealtimeChannel>) -> Self {
        Self { pool, channel }
    }

    pub fn from_state(state: &Arc<AppState>) -> Self {
        Self::new(state.db.clone(), state.realtime.clone())
    }

    /// Record that `actor_name` shared a subject with `target_user_id` and push
    /// it to the target's channel. Texts are rendered in the target's language.
    pub async fn notify_share(
        &self,
        target_user_id: &str,
        actor_name: &str,
        subject_name: &str,
        subject_type: SubjectKind,
    ) -> AppResult<Notification> {
        let target = UserRepository::find_by_id(&self.pool, target_user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(i18n::t("not_found.user")))?;
        let lang = target.lang.as_deref();

        let subject_label = i18n::tr(lang, &format!("subject.{}", subject_type.as_str()), None);
        let params = [
            ("actor", actor_name),
            ("subject", subject_name),
            ("subject_type", subject_label.as_str()),
        ];

        let notification = NotificationRepository::create(
            &self.pool,
            CreateNotification {
                user_id: target.id.clone(),
                notification_type: NotificationType::Shared,
                title: i18n::tr(lang, "notifications.shared.title", Some(&params)),
                description: i18n::tr(lang, "notifications.shared.description", Some(&params)),
                actor_name: Some(actor_name.to_string()),
            },
        )
        .await?;

        self.push(&notification).await;
        Ok(notification)
    }

    /// Tell a task's owner the task went past its due date.
    pub async fn notify_expired(&self, task: &Task) -> AppResult<Notification> {
        let owner = UserRepository::find_by_id(&self.pool, &task.owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(i18n::t("not_found.user")))?;
        let lang = owner.lang.as_deref();
        let params = [("subject", task.title.as_str())];

        let notification = NotificationRepository::create(
            &self.pool,
            CreateNotification {
                user_id: owner.id.clone(),
                notification_type: NotificationType::Expired,
                title: i18n::tr(lang, "notifications.expired.title", Some(&params)),
                description: i18n::tr(lang, "notifications.expired.description", Some(&params)),
                actor_name: None,
            },
        )
        .await?;

        self.push(&notification).await;
        Ok(notification)
    }

    /// Best-effort live delivery; failures leave the persisted row for polling.
    async fn push(&self, notification: &Notification) {
        let channel = Channel::User(notification.user_id.clone());
        match self
            .channel
            .publish(&channel, RealtimeEvent::Notification(notification.clone()))
            .await
        {
            Ok(receivers) => tracing::debug!(
                "Pushed notification {} to {} ({} receivers)",
                notification.id,
                channel,
                receivers
            ),
            Err(e) => tracing::debug!(
                "Notification {} left for polling: {}",
                notification.id,
                e
            ),
        }
    }

    /// Load a notification and make sure it belongs to the caller.
    async fn owned_by(&self, notification_id: &str, caller_id: &str) -> AppResult<Notification> {
        let notification = NotificationRepository::find_by_id(&self.pool, notification_id)
            .await?
            .ok_or_else(|| AppError::NotFound(i18n::t("not_found.notification")))?;

        if notification.user_id != caller_id {
            tracing::warn!(
                "Access denied: user {} touched notification {} of user {}",
                caller_id,
                notification.id,
                notification.user_id
            );
            return Err(AppError::Forbidden);
        }

        Ok(notification)
    }

    /// Mark one notification read. Marking an already-read notification
    /// succeeds without writing.
    pub async fn mark_read(&self, notification_id: &str, caller_id: &str) -> AppResult<Notification> {
        let notification = self.owned_by(notification_id, caller_id).await?;
        if notification.read {
            return Ok(notification);
        }
        NotificationRepository::mark_read(&self.pool, &notification.id).await
    }

    /// Mark all of the caller's unread notifications read; returns the count updated.
    pub async fn mark_all_read(&self, caller_id: &str) -> AppResult<u64> {
        let updated = NotificationRepository::mark_all_read(&self.pool, caller_id).await?;
        tracing::debug!("Marked {} notifications read for user {}", updated, caller_id);
        Ok(updated)
    }

    pub async fn delete(&self, notification_id: &str, caller_id: &str) -> AppResult<()> {
        let notification = self.owned_by(notification_id, caller_id).await?;
        NotificationRepository::delete(&self.pool, &notification.id).await?;
        Ok(())
    }

    pub async fn list(
        &self,
        caller_id: &str,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> AppResult<NotificationPage> {
        let (items, total) = tokio::try_join!(
            NotificationRepository::find_by_user_id(&self.pool, caller_id, unread_only, limit, offset),
            NotificationRepository::count_by_user_id(&self.pool, caller_id, unread_only),
        )?;

        Ok(NotificationPage { items, total })
    }

    pub async fn unread_count(&self, caller_id: &str) -> AppResult<i64> {
        NotificationRepository::count_by_user_id(&self.pool, caller_id, true).await
    }
}
