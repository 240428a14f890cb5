pub mod models;
pub mod repository;

pub use models::*;
pub use repository::*;

/// In-memory database with migrations applied. A single connection keeps the
/// memory database alive for the lifetime of the pool.
#[cfg(test)]
pub async fn test_pool() -> sqlx::SqlitePool {
    use std::str::FromStr;

    let options = sqlx::sqlite::SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid sqlite url")
        .foreign_keys(true);
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("open in-memory database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

/// Insert a user with a throwaway password hash.
#[cfg(test)]
pub async fn test_user(pool: &sqlx::SqlitePool, name: &str) -> User {
    UserRepository::create(
        pool,
        CreateUser {
            email: format!("{}@example.com", name.to_lowercase()),
            name: name.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            lang: None,
        },
    )
    .await
    .expect("create test user")
}
