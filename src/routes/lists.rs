use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::{ListRepository, Permission, SubjectKind, Task, TaskList, TaskRepository};
use crate::error::{AppError, AppResult};
use crate::i18n::t;
use crate::routes::auth::AuthUser;
use crate::routes::tasks::{publish_to_list, validate_title};
use crate::services::realtime::RealtimeEvent;
use crate::services::sharing::require_access;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_lists).post(create_list))
        .route("/:id", get(get_list).put(rename_list).delete(delete_list))
        .route("/:id/tasks", get(list_tasks))
}

#[derive(Debug, Deserialize)]
pub struct ListRequest {
    pub name: String,
}

/// Lists the caller owns or that were shared with them
async fn list_lists(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<TaskList>>> {
    let lists = ListRepository::list_accessible(&state.db, &user.id).await?;
    Ok(Json(lists))
}

async fn create_list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<ListRequest>,
) -> AppResult<(StatusCode, Json<TaskList>)> {
    let name = validate_title(&request.name)?;
    let list = ListRepository::create(&state.db, &user.id, &name).await?;
    tracing::info!("User {} created list {}", user.id, list.id);
    Ok((StatusCode::CREATED, Json(list)))
}

async fn get_list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(list_id): Path<String>,
) -> AppResult<Json<TaskList>> {
    require_access(&state.db, SubjectKind::List, &list_id, &user.id, Permission::View).await?;
    let list = ListRepository::find_by_id(&state.db, &list_id)
        .await?
        .ok_or_else(|| AppError::NotFound(t("not_found.list")))?;
    Ok(Json(list))
}

async fn rename_list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(list_id): Path<String>,
    Json(request): Json<ListRequest>,
) -> AppResult<Json<TaskList>> {
    require_access(&state.db, SubjectKind::List, &list_id, &user.id, Permission::Edit).await?;
    let name = validate_title(&request.name)?;
    let list = ListRepository::rename(&state.db, &list_id, &name).await?;
    Ok(Json(list))
}

/// Owner only. Tasks in the list and all shares go with it; list followers get
/// a `task_deleted` per task, then `list_deleted`.
async fn delete_list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(list_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let (subject, access) =
        require_access(&state.db, SubjectKind::List, &list_id, &user.id, Permission::View).await?;
    if !access.is_owner() {
        return Err(AppError::Forbidden);
    }

    let tasks = TaskRepository::list_by_list(&state.db, &subject.id).await?;
    ListRepository::delete(&state.db, &subject.id).await?;
    tracing::info!("User {} deleted list {}", user.id, subject.id);

    for task in tasks {
        publish_to_list(
            &state,
            &subject.id,
            RealtimeEvent::TaskDeleted {
                id: task.id,
                list_id: subject.id.clone(),
            },
        )
        .await;
    }
    publish_to_list(
        &state,
        &subject.id,
        RealtimeEvent::ListDeleted {
            id: subject.id.clone(),
        },
    )
    .await;

    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(list_id): Path<String>,
) -> AppResult<Json<Vec<Task>>> {
    require_access(&state.db, SubjectKind::List, &list_id, &user.id, Permission::View).await?;
    let tasks = TaskRepository::list_by_list(&state.db, &list_id).await?;
    Ok(Json(tasks))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::routes::testing::{send, test_app, user_with_token};
    use crate::services::realtime::{Channel, RealtimeEvent};

    async fn create_list(app: &axum::Router, token: &str, name: &str) -> Value {
        let (status, list) = send(
            app,
            Method::POST,
            "/api/lists",
            Some(token),
            Some(json!({ "name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        list
    }

    #[tokio::test]
    async fn viewer_sees_list_and_its_tasks() {
        let (app, state) = test_app().await;
        let (_, owner) = user_with_token(&state, "Ann").await;
        let (_, viewer) = user_with_token(&state, "Bob").await;

        let list = create_list(&app, &owner, "Chores").await;
        let list_id = list["id"].as_str().unwrap();
        send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&owner),
            Some(json!({"title": "Vacuum", "list_id": list_id})),
        )
        .await;

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/lists/{}/tasks", list_id),
            Some(&viewer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        send(
            &app,
            Method::POST,
            &format!("/api/lists/{}/shares", list_id),
            Some(&owner),
            Some(json!({"email": "bob@example.com", "permission": "VIEW"})),
        )
        .await;

        let (status, tasks) = send(
            &app,
            Method::GET,
            &format!("/api/lists/{}/tasks", list_id),
            Some(&viewer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tasks[0]["title"], "Vacuum");

        let (_, lists) = send(&app, Method::GET, "/api/lists", Some(&viewer), None).await;
        assert_eq!(lists.as_array().unwrap().len(), 1);

        // VIEW on the list is not enough to add tasks to it.
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&viewer),
            Some(json!({"title": "Dust", "list_id": list_id})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn deleting_list_removes_tasks() {
        let (app, state) = test_app().await;
        let (_, owner) = user_with_token(&state, "Ann").await;

        let list = create_list(&app, &owner, "Trip").await;
        let list_id = list["id"].as_str().unwrap();
        let (_, task) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&owner),
            Some(json!({"title": "Pack", "list_id": list_id})),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::DELETE,
            &format!("/api/lists/{}", list_id),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/tasks/{}", task["id"].as_str().unwrap()),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_list_is_not_found() {
        let (app, state) = test_app().await;
        let (_, token) = user_with_token(&state, "Ann").await;
        let (status, body) =
            send(&app, Method::GET, "/api/lists/missing", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn deleting_list_notifies_followers() {
        let (app, state) = test_app().await;
        let (_, owner) = user_with_token(&state, "Ann").await;

        let list = create_list(&app, &owner, "Garden").await;
        let list_id = list["id"].as_str().unwrap().to_string();
        let (_, task) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(&owner),
            Some(json!({"title": "Weed", "list_id": list_id})),
        )
        .await;
        let mut rx = state.realtime.subscribe(Channel::List(list_id.clone())).await;

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/lists/{}", list_id),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        match rx.try_recv().unwrap() {
            RealtimeEvent::TaskDeleted { id, list_id: from } => {
                assert_eq!(id, task["id"].as_str().unwrap());
                assert_eq!(from, list_id);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match rx.try_recv().unwrap() {
            RealtimeEvent::ListDeleted { id } => assert_eq!(id, list_id),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }
}
