use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{User, UserRepository};
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::AppState;

/// Router for user-related endpoints (picking share targets)
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(search_users))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Email or name prefix
    pub q: Option<String>,
    /// Maximum number of results to return
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
        }
    }
}

/// Search users by email or name prefix.
/// Requires authentication. Returns an empty array for empty/too-short queries.
async fn search_users(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<UserResponse>>> {
    let q = query.q.unwrap_or_default().trim().to_string();

    if q.chars().count() < 2 {
        return Ok(Json(Vec::new()));
    }

    let limit = query.limit.unwrap_or(10).clamp(1, 50) as i64;

    let users = UserRepository::search(&state.db, &q, limit).await?;
    let res: Vec<UserResponse> = users.into_iter().map(Into::into).collect();

    Ok(Json(res))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::db::test_user;
    use crate::routes::testing::{send, test_app, user_with_token};

    #[tokio::test]
    async fn search_by_prefix() {
        let (app, state) = test_app().await;
        let (_, token) = user_with_token(&state, "Alice").await;
        test_user(&state.db, "Bob").await;
        test_user(&state.db, "Boris").await;

        let (status, body) = send(&app, Method::GET, "/api/users?q=bo", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert!(body[0].get("password_hash").is_none());

        let (_, body) = send(&app, Method::GET, "/api/users?q=b", Some(&token), None).await;
        assert!(body.as_array().unwrap().is_empty());
    }
}
