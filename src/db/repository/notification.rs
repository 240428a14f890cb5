use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Notification Repository
// ============================================================================

pub struct NotificationRepository;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, notification_type, title, description, actor_name, read, created_at";

impl NotificationRepository {
    pub async fn create(
        pool: &SqlitePool,
        notification: CreateNotification,
    ) -> AppResult<Notification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (
                id, user_id, notification_type, title, description, actor_name, read, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(&notification.user_id)
        .bind(notification.notification_type)
        .bind(&notification.title)
        .bind(&notification.description)
        .bind(&notification.actor_name)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Notification>> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Page through a user's notifications, newest first.
    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: &str,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = ?
              AND (? = 0 OR read = 0)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            OFFSET ?
            "#
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn count_by_user_id(
        pool: &SqlitePool,
        user_id: &str,
        unread_only: bool,
    ) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND (? = 0 OR read = 0)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Set `read = 1`. Already-read rows are left untouched.
    pub async fn mark_read(pool: &SqlitePool, id: &str) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications SET read = 1
            WHERE id = ?
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
    }

    /// Mark every unread notification of a user as read; returns how many changed.
    pub async fn mark_all_read(pool: &SqlitePool, user_id: &str) -> AppResult<u64> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ? AND read = 0")
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Batch-delete notifications of one type created before `cutoff`.
    pub async fn delete_by_type_older_than(
        pool: &SqlitePool,
        notification_type: NotificationType,
        cutoff: NaiveDateTime,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE notification_type = ? AND created_at < ?",
        )
        .bind(notification_type)
        .bind(cutoff)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Batch-delete read notifications of any type created before `cutoff`.
    pub async fn delete_read_older_than(pool: &SqlitePool, cutoff: NaiveDateTime) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE read = 1 AND created_at < ?")
            .bind(cutoff)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, test_user};

    fn shared_for(user_id: &str) -> CreateNotification {
        CreateNotification {
            user_id: user_id.to_string(),
            notification_type: NotificationType::Shared,
            title: "Shared".to_string(),
            description: "A list was shared".to_string(),
            actor_name: Some("Alice".to_string()),
        }
    }

    #[tokio::test]
    async fn unread_filter_and_counts() {
        let pool = test_pool().await;
        let bob = test_user(&pool, "Bob").await;

        let first = NotificationRepository::create(&pool, shared_for(&bob.id)).await.unwrap();
        NotificationRepository::create(&pool, shared_for(&bob.id)).await.unwrap();
        NotificationRepository::mark_read(&pool, &first.id).await.unwrap();

        assert_eq!(
            NotificationRepository::count_by_user_id(&pool, &bob.id, false).await.unwrap(),
            2
        );
        assert_eq!(
            NotificationRepository::count_by_user_id(&pool, &bob.id, true).await.unwrap(),
            1
        );
        let unread = NotificationRepository::find_by_user_id(&pool, &bob.id, true, 10, 0)
            .await
            .unwrap();
        assert_eq!(unread.len(), 1);
        assert!(!unread[0].read);
    }

    #[tokio::test]
    async fn mark_all_read_reports_changed_rows_only() {
        let pool = test_pool().await;
        let bob = test_user(&pool, "Bob").await;
        for _ in 0..3 {
            NotificationRepository::create(&pool, shared_for(&bob.id)).await.unwrap();
        }

        assert_eq!(NotificationRepository::mark_all_read(&pool, &bob.id).await.unwrap(), 3);
        assert_eq!(NotificationRepository::mark_all_read(&pool, &bob.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn type_cutoff_only_touches_that_type() {
        let pool = test_pool().await;
        let bob = test_user(&pool, "Bob").await;
        NotificationRepository::create(&pool, shared_for(&bob.id)).await.unwrap();
        NotificationRepository::create(
            &pool,
            CreateNotification {
                notification_type: NotificationType::Expired,
                ..shared_for(&bob.id)
            },
        )
        .await
        .unwrap();

        let future = Utc::now().naive_utc() + chrono::Duration::seconds(5);
        let removed = NotificationRepository::delete_by_type_older_than(
            &pool,
            NotificationType::Expired,
            future,
        )
        .await
        .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(
            NotificationRepository::count_by_user_id(&pool, &bob.id, false).await.unwrap(),
            1
        );
    }
}
