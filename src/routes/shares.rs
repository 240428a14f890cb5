//! Share endpoints, mounted under both `/api/tasks` and `/api/lists`. The
//! subject kind reaches the handlers as a request extension.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::db::{IncomingShare, Permission, Share, ShareWithUser, SubjectKind};
use crate::error::{AppError, AppResult};
use crate::i18n::t;
use crate::routes::auth::AuthUser;
use crate::routes::tasks::publish_to_list;
use crate::services::realtime::RealtimeEvent;
use crate::services::sharing::ShareService;
use crate::AppState;

pub fn router(kind: SubjectKind) -> Router<Arc<AppState>> {
    Router::new()
        .route("/:id/shares", get(list_shares).post(create_share))
        .route(
            "/:id/shares/:user_id",
            put(update_share).delete(revoke_share),
        )
        .layer(Extension(kind))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    pub email: String,
    pub permission: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateShareRequest {
    pub permission: String,
}

fn parse_permission(value: &str) -> AppResult<Permission> {
    value
        .parse()
        .map_err(|_| AppError::Validation(t("validation.invalid_permission")))
}

// ============================================================================
// Handlers
// ============================================================================

/// Everyone the subject is shared with. Needs VIEW on the subject.
async fn list_shares(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<SubjectKind>,
    AuthUser(user): AuthUser,
    Path(subject_id): Path<String>,
) -> AppResult<Json<Vec<ShareWithUser>>> {
    let shares = ShareService::from_state(&state)
        .list_shares(kind, &subject_id, &user.id)
        .await?;
    Ok(Json(shares))
}

async fn create_share(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<SubjectKind>,
    AuthUser(user): AuthUser,
    Path(subject_id): Path<String>,
    Json(request): Json<CreateShareRequest>,
) -> AppResult<(StatusCode, Json<Share>)> {
    let permission = parse_permission(&request.permission)?;
    let share = ShareService::from_state(&state)
        .create_share(kind, &subject_id, &user, &request.email, permission)
        .await?;
    Ok((StatusCode::CREATED, Json(share)))
}

async fn update_share(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<SubjectKind>,
    AuthUser(user): AuthUser,
    Path((subject_id, target_user_id)): Path<(String, String)>,
    Json(request): Json<UpdateShareRequest>,
) -> AppResult<Json<Share>> {
    let permission = parse_permission(&request.permission)?;
    let share = ShareService::from_state(&state)
        .update_share(kind, &subject_id, &user.id, &target_user_id, permission)
        .await?;
    Ok(Json(share))
}

/// Revoke a share. Managers may revoke anyone's; a grantee may drop their own.
async fn revoke_share(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<SubjectKind>,
    AuthUser(user): AuthUser,
    Path((subject_id, target_user_id)): Path<(String, String)>,
) -> AppResult<Json<serde_json::Value>> {
    ShareService::from_state(&state)
        .remove_share(kind, &subject_id, &user.id, &target_user_id)
        .await?;

    if kind == SubjectKind::List {
        publish_to_list(
            &state,
            &subject_id,
            RealtimeEvent::AccessRevoked {
                list_id: subject_id.clone(),
                user_id: target_user_id,
            },
        )
        .await;
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Tasks and lists other users shared with the caller
pub async fn list_incoming(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<IncomingShare>>> {
    let shares = ShareService::from_state(&state).incoming(&user.id).await?;
    Ok(Json(shares))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::routes::testing::{send, test_app, user_with_token};

    async fn create_task(app: &axum::Router, token: &str) -> String {
        let (_, task) = send(
            app,
            Method::POST,
            "/api/tasks",
            Some(token),
            Some(json!({"title": "Report"})),
        )
        .await;
        task["id"].as_str().unwrap().to_string()
    }

    async fn share(app: &axum::Router, token: &str, uri: &str, email: &str, perm: &str) -> (StatusCode, Value) {
        send(
            app,
            Method::POST,
            uri,
            Some(token),
            Some(json!({"email": email, "permission": perm})),
        )
        .await
    }

    #[tokio::test]
    async fn share_lifecycle() {
        let (app, state) = test_app().await;
        let (_, owner) = user_with_token(&state, "Ann").await;
        let (bob, bob_token) = user_with_token(&state, "Bob").await;
        let task_id = create_task(&app, &owner).await;
        let uri = format!("/api/tasks/{}/shares", task_id);

        let (status, created) = share(&app, &owner, &uri, "bob@example.com", "view").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["permission"], "VIEW");

        let (status, body) = share(&app, &owner, &uri, "bob@example.com", "EDIT").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, listed) = send(&app, Method::GET, &uri, Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["user_email"], "bob@example.com");

        let member_uri = format!("{}/{}", uri, bob.id);
        let (status, updated) = send(
            &app,
            Method::PUT,
            &member_uri,
            Some(&owner),
            Some(json!({"permission": "ADMIN"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["permission"], "ADMIN");

        let (_, incoming) =
            send(&app, Method::GET, "/api/shared-with-me", Some(&bob_token), None).await;
        assert_eq!(incoming[0]["subject_kind"], "task");
        assert_eq!(incoming[0]["permission"], "ADMIN");

        let (status, body) = send(&app, Method::DELETE, &member_uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (status, _) = send(&app, Method::GET, &uri, Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn bad_permission_and_unknown_email() {
        let (app, state) = test_app().await;
        let (_, owner) = user_with_token(&state, "Ann").await;
        user_with_token(&state, "Bob").await;
        let task_id = create_task(&app, &owner).await;
        let uri = format!("/api/tasks/{}/shares", task_id);

        let (status, _) = share(&app, &owner, &uri, "bob@example.com", "OWNER").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = share(&app, &owner, &uri, "nobody@example.com", "VIEW").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = share(&app, &owner, &uri, "ann@example.com", "VIEW").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn viewer_cannot_share_further() {
        let (app, state) = test_app().await;
        let (_, owner) = user_with_token(&state, "Ann").await;
        let (_, bob) = user_with_token(&state, "Bob").await;
        user_with_token(&state, "Carol").await;
        let task_id = create_task(&app, &owner).await;
        let uri = format!("/api/tasks/{}/shares", task_id);

        share(&app, &owner, &uri, "bob@example.com", "VIEW").await;
        let (status, body) = share(&app, &bob, &uri, "carol@example.com", "VIEW").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn share_notification_reaches_target() {
        let (app, state) = test_app().await;
        let (_, owner) = user_with_token(&state, "Ann").await;
        let (_, bob) = user_with_token(&state, "Bob").await;
        let (_, list) = send(
            &app,
            Method::POST,
            "/api/lists",
            Some(&owner),
            Some(json!({"name": "Weekend"})),
        )
        .await;
        let uri = format!("/api/lists/{}/shares", list["id"].as_str().unwrap());

        let (status, _) = share(&app, &owner, &uri, "bob@example.com", "EDIT").await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, page) = send(&app, Method::GET, "/api/notifications", Some(&bob), None).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["notification_type"], "SHARED");
        assert_eq!(page["items"][0]["actor_name"], "Ann");
    }
}
