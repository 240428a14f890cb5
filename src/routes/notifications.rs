use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::Notification;
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::services::notifications::NotificationDispatcher;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", put(mark_all_read))
        .route("/:id/read", put(mark_read))
        .route("/:id", delete(delete_notification))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub unread_only: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsListResponse {
    pub items: Vec<Notification>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Notifications for the current user, newest first
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<NotificationsListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = page.saturating_sub(1).saturating_mul(per_page);

    let result = NotificationDispatcher::from_state(&state)
        .list(
            &user.id,
            query.unread_only.unwrap_or(false),
            per_page,
            offset,
        )
        .await?;

    let total_pages = (result.total + per_page - 1) / per_page;

    Ok(Json(NotificationsListResponse {
        items: result.items,
        total: result.total,
        page,
        per_page,
        total_pages,
    }))
}

async fn unread_count(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let count = NotificationDispatcher::from_state(&state)
        .unread_count(&user.id)
        .await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(notification_id): Path<String>,
) -> AppResult<Json<Notification>> {
    let notification = NotificationDispatcher::from_state(&state)
        .mark_read(&notification_id, &user.id)
        .await?;
    Ok(Json(notification))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    let updated = NotificationDispatcher::from_state(&state)
        .mark_all_read(&user.id)
        .await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

async fn delete_notification(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(notification_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    NotificationDispatcher::from_state(&state)
        .delete(&notification_id, &user.id)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::db::SubjectKind;
    use crate::routes::testing::{send, test_app, user_with_token};
    use crate::services::notifications::NotificationDispatcher;

    #[tokio::test]
    async fn paging_and_read_state() {
        let (app, state) = test_app().await;
        let (user, token) = user_with_token(&state, "Ann").await;
        let dispatcher = NotificationDispatcher::from_state(&state);
        for name in ["One", "Two", "Three"] {
            dispatcher
                .notify_share(&user.id, "Bob", name, SubjectKind::Task)
                .await
                .unwrap();
        }

        let (status, page) = send(
            &app,
            Method::GET,
            "/api/notifications?page=1&per_page=2",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 3);
        assert_eq!(page["total_pages"], 2);
        assert_eq!(page["items"].as_array().unwrap().len(), 2);

        let first_id = page["items"][0]["id"].as_str().unwrap().to_string();
        let (status, read) = send(
            &app,
            Method::PUT,
            &format!("/api/notifications/{}/read", first_id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read["read"], true);

        let (_, count) = send(
            &app,
            Method::GET,
            "/api/notifications/unread-count",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(count["count"], 2);

        let (_, unread) = send(
            &app,
            Method::GET,
            "/api/notifications?unread_only=true",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(unread["total"], 2);

        let (_, body) = send(
            &app,
            Method::PUT,
            "/api/notifications/read-all",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["updated"], 2);
    }

    #[tokio::test]
    async fn cannot_touch_other_users_notifications() {
        let (app, state) = test_app().await;
        let (owner, _) = user_with_token(&state, "Ann").await;
        let (_, other) = user_with_token(&state, "Eve").await;
        let n = NotificationDispatcher::from_state(&state)
            .notify_share(&owner.id, "Bob", "Secret", SubjectKind::List)
            .await
            .unwrap();

        let uri = format!("/api/notifications/{}", n.id);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) =
            send(&app, Method::PUT, &format!("{}/read", uri), Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::DELETE,
            "/api/notifications/missing",
            Some(&other),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn page_far_past_the_end_is_empty() {
        let (app, state) = test_app().await;
        let (user, token) = user_with_token(&state, "Ann").await;
        NotificationDispatcher::from_state(&state)
            .notify_share(&user.id, "Bob", "Chores", SubjectKind::List)
            .await
            .unwrap();

        let (status, page) = send(
            &app,
            Method::GET,
            &format!("/api/notifications?page={}&per_page=100", i64::MAX),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["items"].as_array().unwrap().len(), 0);
        assert_eq!(page["total"], 1);
        assert_eq!(page["page"], i64::MAX);
    }
}
