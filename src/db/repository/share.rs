use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Share Repository
// ============================================================================

pub struct ShareRepository;

impl ShareRepository {
    /// Load the subject a share would point at.
    pub async fn find_subject(
        pool: &SqlitePool,
        kind: SubjectKind,
        subject_id: &str,
    ) -> AppResult<Option<Subject>> {
        let sql = match kind {
            SubjectKind::Task => {
                "SELECT id, title AS name, owner_id, list_id FROM tasks WHERE id = ?"
            }
            SubjectKind::List => {
                "SELECT id, name, owner_id, NULL AS list_id FROM lists WHERE id = ?"
            }
        };

        let row = sqlx::query(sql)
            .bind(subject_id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(row.map(|r| Subject {
            kind,
            id: r.get("id"),
            name: r.get("name"),
            owner_id: r.get("owner_id"),
            list_id: r.get("list_id"),
        }))
    }

    /// Insert a share. The `(subject_id, user_id)` uniqueness constraint is the
    /// source of truth; a violation maps to `Conflict`.
    pub async fn create(
        pool: &SqlitePool,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
        permission: Permission,
    ) -> AppResult<Share> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Share>(&format!(
            r#"
            INSERT INTO {table} (id, subject_id, user_id, permission, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, subject_id, user_id, permission, created_at, updated_at
            "#,
            table = kind.share_table()
        ))
        .bind(&id)
        .bind(subject_id)
        .bind(user_id)
        .bind(permission)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::from_db(e, "Share already exists; update it instead"))
    }

    pub async fn find(
        pool: &SqlitePool,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
    ) -> AppResult<Option<Share>> {
        sqlx::query_as::<_, Share>(&format!(
            r#"
            SELECT id, subject_id, user_id, permission, created_at, updated_at
            FROM {table}
            WHERE subject_id = ? AND user_id = ?
            LIMIT 1
            "#,
            table = kind.share_table()
        ))
        .bind(subject_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Change the permission of an existing share. `None` if there is no share.
    pub async fn update_permission(
        pool: &SqlitePool,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
        permission: Permission,
    ) -> AppResult<Option<Share>> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Share>(&format!(
            r#"
            UPDATE {table}
            SET permission = ?, updated_at = ?
            WHERE subject_id = ? AND user_id = ?
            RETURNING id, subject_id, user_id, permission, created_at, updated_at
            "#,
            table = kind.share_table()
        ))
        .bind(permission)
        .bind(now)
        .bind(subject_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Delete a share. Returns whether a row was removed.
    pub async fn delete(
        pool: &SqlitePool,
        kind: SubjectKind,
        subject_id: &str,
        user_id: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE subject_id = ? AND user_id = ?",
            table = kind.share_table()
        ))
        .bind(subject_id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// All shares on a subject with grantee info, in insertion order.
    pub async fn list_for_subject(
        pool: &SqlitePool,
        kind: SubjectKind,
        subject_id: &str,
    ) -> AppResult<Vec<ShareWithUser>> {
        sqlx::query_as::<_, ShareWithUser>(&format!(
            r#"
            SELECT
                s.id, s.subject_id, s.user_id, s.permission,
                u.email AS user_email, u.name AS user_name,
                s.created_at, s.updated_at
            FROM {table} s
            JOIN users u ON u.id = s.user_id
            WHERE s.subject_id = ?
            ORDER BY s.rowid ASC
            "#,
            table = kind.share_table()
        ))
        .bind(subject_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Shares granted to a user across tasks and lists, newest first.
    pub async fn list_incoming(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<IncomingShare>> {
        let mut out = Vec::new();

        for kind in [SubjectKind::Task, SubjectKind::List] {
            let name_column = match kind {
                SubjectKind::Task => "title",
                SubjectKind::List => "name",
            };

            let rows = sqlx::query(&format!(
                r#"
                SELECT
                    s.subject_id, s.permission, s.created_at,
                    x.{name_column} AS subject_name, x.owner_id
                FROM {table} s
                JOIN {subjects} x ON x.id = s.subject_id
                WHERE s.user_id = ?
                "#,
                table = kind.share_table(),
                subjects = kind.subject_table(),
            ))
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(AppError::Database)?;

            for r in rows {
                out.push(IncomingShare {
                    subject_kind: kind,
                    subject_id: r.get("subject_id"),
                    subject_name: r.get("subject_name"),
                    owner_id: r.get("owner_id"),
                    permission: r.get("permission"),
                    created_at: r.get("created_at"),
                });
            }
        }

        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}
