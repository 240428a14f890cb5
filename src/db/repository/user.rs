use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

const USER_COLUMNS: &str = "id, email, name, password_hash, lang, created_at, updated_at";

impl UserRepository {
    /// Insert a new user. Emails are unique (case-insensitive); a duplicate
    /// maps to `Conflict`.
    pub async fn create(pool: &SqlitePool, user: CreateUser) -> AppResult<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, password_hash, lang, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&id)
        .bind(user.email.trim().to_lowercase())
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.lang)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::from_db(e, "A user with this email already exists"))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ? LIMIT 1"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Prefix search on email or name, used to pick share targets.
    pub async fn search(pool: &SqlitePool, query: &str, limit: i64) -> AppResult<Vec<User>> {
        let pattern = format!("{}%", query.replace('%', "").replace('_', ""));

        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE email LIKE ? OR name LIKE ?
            ORDER BY name ASC
            LIMIT ?
            "#
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn update_profile(
        pool: &SqlitePool,
        user_id: &str,
        name: Option<&str>,
        lang: Option<Option<&str>>,
    ) -> AppResult<User> {
        let now = Utc::now().naive_utc();
        let set_lang = lang.is_some();
        let lang_value = lang.flatten();

        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE(?, name),
                lang = CASE WHEN ? THEN ? ELSE lang END,
                updated_at = ?
            WHERE id = ?
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(set_lang)
        .bind(lang_value)
        .bind(now)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
