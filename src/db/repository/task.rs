use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Task Repository
// ============================================================================

pub struct TaskRepository;

const TASK_COLUMNS: &str = "id, title, description, completed, due_date, list_id, owner_id, \
                            expired_notified, created_at, updated_at";

impl TaskRepository {
    pub async fn create(pool: &SqlitePool, owner_id: &str, task: CreateTask) -> AppResult<Task> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (
                id, title, description, completed, due_date, list_id, owner_id,
                expired_notified, created_at, updated_at
            ) VALUES (?, ?, ?, 0, ?, ?, ?, 0, ?, ?)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.due_date)
        .bind(&task.list_id)
        .bind(owner_id)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Task>> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Tasks the user owns, tasks shared with them directly, and tasks in lists
    /// they own or that are shared with them.
    pub async fn list_accessible(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<Task>> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM tasks t
            WHERE t.owner_id = ?
               OR EXISTS (SELECT 1 FROM task_shares s WHERE s.subject_id = t.id AND s.user_id = ?)
               OR EXISTS (SELECT 1 FROM lists l WHERE l.id = t.list_id AND l.owner_id = ?)
               OR EXISTS (SELECT 1 FROM list_shares s WHERE s.subject_id = t.list_id AND s.user_id = ?)
            ORDER BY t.created_at ASC
            "#
        ))
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_by_list(pool: &SqlitePool, list_id: &str) -> AppResult<Vec<Task>> {
        sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE list_id = ? ORDER BY created_at ASC"
        ))
        .bind(list_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn update(pool: &SqlitePool, id: &str, update: UpdateTask) -> AppResult<Task> {
        let now = Utc::now().naive_utc();
        let set_description = update.description.is_some();
        let set_due_date = update.due_date.is_some();

        // A changed due date re-arms the overdue notification.
        sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET title = COALESCE(?, title),
                description = CASE WHEN ? THEN ? ELSE description END,
                completed = COALESCE(?, completed),
                due_date = CASE WHEN ? THEN ? ELSE due_date END,
                expired_notified = CASE WHEN ? THEN 0 ELSE expired_notified END,
                updated_at = ?
            WHERE id = ?
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(update.title)
        .bind(set_description)
        .bind(update.description.flatten())
        .bind(update.completed)
        .bind(set_due_date)
        .bind(update.due_date.flatten())
        .bind(set_due_date)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Incomplete tasks past their due date that have not been reported yet.
    pub async fn find_overdue_unnotified(
        pool: &SqlitePool,
        now: NaiveDateTime,
        limit: i64,
    ) -> AppResult<Vec<Task>> {
        sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM tasks
            WHERE completed = 0
              AND expired_notified = 0
              AND due_date IS NOT NULL
              AND due_date < ?
            ORDER BY due_date ASC
            LIMIT ?
            "#
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn mark_expired_notified(pool: &SqlitePool, id: &str) -> AppResult<()> {
        sqlx::query("UPDATE tasks SET expired_notified = 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
