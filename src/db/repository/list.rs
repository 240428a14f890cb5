use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// List Repository
// ============================================================================

pub struct ListRepository;

impl ListRepository {
    pub async fn create(pool: &SqlitePool, owner_id: &str, name: &str) -> AppResult<TaskList> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, TaskList>(
            r#"
            INSERT INTO lists (id, name, owner_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, name, owner_id, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(owner_id)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<TaskList>> {
        sqlx::query_as::<_, TaskList>(
            "SELECT id, name, owner_id, created_at, updated_at FROM lists WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Lists the user owns plus lists shared with them.
    pub async fn list_accessible(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<TaskList>> {
        sqlx::query_as::<_, TaskList>(
            r#"
            SELECT l.id, l.name, l.owner_id, l.created_at, l.updated_at
            FROM lists l
            WHERE l.owner_id = ?
               OR EXISTS (SELECT 1 FROM list_shares s WHERE s.subject_id = l.id AND s.user_id = ?)
            ORDER BY l.created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn rename(pool: &SqlitePool, id: &str, name: &str) -> AppResult<TaskList> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, TaskList>(
            r#"
            UPDATE lists SET name = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, name, owner_id, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("List not found".to_string()))
    }

    /// Delete a list. Its tasks and all related shares go with it.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
