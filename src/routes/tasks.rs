use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};

use crate::db::{CreateTask, Permission, SubjectKind, Task, TaskRepository, UpdateTask};
use crate::error::{AppError, AppResult};
use crate::i18n::t;
use crate::routes::auth::AuthUser;
use crate::services::realtime::{Channel, RealtimeChannel, RealtimeEvent};
use crate::services::sharing::require_access;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    /// `null` clears the description; a missing field leaves it untouched.
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDateTime>>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trimmed title, 1 to 200 characters. Shared by tasks and lists.
pub(crate) fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    let len = title.chars().count();
    if len == 0 || len > 200 {
        return Err(AppError::Validation(t("validation.invalid_title")));
    }
    Ok(title.to_string())
}

/// Push a task change to the containing list's channel. Nobody listening is fine.
pub(crate) async fn publish_to_list(state: &Arc<AppState>, list_id: &str, event: RealtimeEvent) {
    if let Err(e) = state
        .realtime
        .publish(&Channel::List(list_id.to_string()), event)
        .await
    {
        tracing::debug!("Live task update not delivered: {}", e);
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Tasks the caller owns or that were shared with them directly
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<Task>>> {
    let tasks = TaskRepository::list_accessible(&state.db, &user.id).await?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(mut request): Json<CreateTask>,
) -> AppResult<(StatusCode, Json<Task>)> {
    request.title = validate_title(&request.title)?;

    if let Some(list_id) = &request.list_id {
        require_access(&state.db, SubjectKind::List, list_id, &user.id, Permission::Edit).await?;
    }

    let task = TaskRepository::create(&state.db, &user.id, request).await?;
    tracing::info!("User {} created task {}", user.id, task.id);

    if let Some(list_id) = &task.list_id {
        publish_to_list(&state, list_id, RealtimeEvent::TaskUpdated(task.clone())).await;
    }

    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(task_id): Path<String>,
) -> AppResult<Json<Task>> {
    require_access(&state.db, SubjectKind::Task, &task_id, &user.id, Permission::View).await?;
    let task = TaskRepository::find_by_id(&state.db, &task_id)
        .await?
        .ok_or_else(|| AppError::NotFound(t("not_found.task")))?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(task_id): Path<String>,
    Json(request): Json<UpdateTaskRequest>,
) -> AppResult<Json<Task>> {
    require_access(&state.db, SubjectKind::Task, &task_id, &user.id, Permission::Edit).await?;

    let title = request.title.as_deref().map(validate_title).transpose()?;
    let task = TaskRepository::update(
        &state.db,
        &task_id,
        UpdateTask {
            title,
            description: request.description,
            completed: request.completed,
            due_date: request.due_date,
        },
    )
    .await?;

    if let Some(list_id) = &task.list_id {
        publish_to_list(&state, list_id, RealtimeEvent::TaskUpdated(task.clone())).await;
    }

    Ok(Json(task))
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(task_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let (subject, access) =
        require_access(&state.db, SubjectKind::Task, &task_id, &user.id, Permission::View).await?;
    if !access.is_owner() {
        return Err(AppError::Forbidden);
    }

    TaskRepository::delete(&state.db, &subject.id).await?;
    tracing::info!("User {} deleted task {}", user.id, subject.id);

    if let Some(list_id) = subject.list_id {
        publish_to_list(
            &state,
            &list_id,
            RealtimeEvent::TaskDeleted {
                id: subject.id,
                list_id: list_id.clone(),
            },
        )
        .await;
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::testing::{send, test_app, user_with_token};
    use crate::services::realtime::{Channel, RealtimeEvent};

    #[tokio::test]
    async fn owner_crud_cycle() {
        let (app, state) = test_app().await;
        let (_, token) = user_with_token(&state, "Ann").await;

        let (status, task) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&token),
            Some(json!({"title": "  Buy milk  ", "description": "2 litres"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["title"], "Buy milk");
        assert!(task.get("expired_notified").is_none());
        let id = task["id"].as_str().unwrap().to_string();

        let (status, task) = send(
            &app,
            Method::PUT,
            &format!("/api/tasks/{}", id),
            Some(&token),
            Some(json!({"completed": true, "description": null})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["completed"], true);
        assert!(task["description"].is_null());
        assert_eq!(task["title"], "Buy milk");

        let (status, list) = send(&app, Method::GET, "/api/tasks", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, _) =
            send(&app, Method::DELETE, &format!("/api/tasks/{}", id), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) =
            send(&app, Method::GET, &format!("/api/tasks/{}", id), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_title_rejected() {
        let (app, state) = test_app().await;
        let (_, token) = user_with_token(&state, "Ann").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&token),
            Some(json!({"title": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn strangers_cannot_touch_task() {
        let (app, state) = test_app().await;
        let (_, owner) = user_with_token(&state, "Ann").await;
        let (_, stranger) = user_with_token(&state, "Eve").await;

        let (_, task) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&owner),
            Some(json!({"title": "Private"})),
        )
        .await;
        let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());

        let (status, _) = send(&app, Method::GET, &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&stranger),
            Some(json!({"completed": true})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn editor_can_update_but_not_delete() {
        let (app, state) = test_app().await;
        let (_, owner) = user_with_token(&state, "Ann").await;
        let (_, editor) = user_with_token(&state, "Bob").await;

        let (_, task) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&owner),
            Some(json!({"title": "Shared"})),
        )
        .await;
        let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("{}/shares", uri),
            Some(&owner),
            Some(json!({"email": "bob@example.com", "permission": "edit"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            &app,
            Method::PUT,
            &uri,
            Some(&editor),
            Some(json!({"title": "Renamed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&editor), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn task_changes_reach_list_channel() {
        let (app, state) = test_app().await;
        let (_, token) = user_with_token(&state, "Ann").await;

        let (_, list) = send(
            &app,
            Method::POST,
            "/api/lists",
            Some(&token),
            Some(json!({"name": "Groceries"})),
        )
        .await;
        let list_id = list["id"].as_str().unwrap().to_string();
        let mut rx = state.realtime.subscribe(Channel::List(list_id.clone())).await;

        let (status, task) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&token),
            Some(json!({"title": "Eggs", "list_id": list_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        match rx.recv().await.unwrap() {
            RealtimeEvent::TaskUpdated(t) => assert_eq!(t.title, "Eggs"),
            other => panic!("unexpected event {:?}", other),
        }

        let id = task["id"].as_str().unwrap();
        send(&app, Method::DELETE, &format!("/api/tasks/{}", id), Some(&token), None).await;
        match rx.recv().await.unwrap() {
            RealtimeEvent::TaskDeleted { id: deleted, .. } => assert_eq!(deleted, id),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
