use std::sync::Arc;

use axum::{routing::get, Router};

use crate::db::SubjectKind;
use crate::AppState;

pub mod auth;
pub mod events;
pub mod health;
pub mod lists;
pub mod notifications;
pub mod shares;
pub mod tasks;
pub mod users;

/// Authenticated API routes. `/api/auth` is mounted separately so it can
/// carry its own rate limiter.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api/users", users::router())
        .nest(
            "/api/lists",
            lists::router().merge(shares::router(SubjectKind::List)),
        )
        .nest(
            "/api/tasks",
            tasks::router().merge(shares::router(SubjectKind::Task)),
        )
        .route("/api/shared-with-me", get(shares::list_incoming))
        .nest("/api/notifications", notifications::router())
        .nest("/api/events", events::router())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        routing::get,
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::util::ServiceExt;

    use crate::config::Config;
    use crate::db::{test_pool, test_user, User};
    use crate::services::auth::AuthService;
    use crate::services::realtime::RealtimeHub;
    use crate::AppState;

    pub async fn test_state() -> Arc<AppState> {
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();

        Arc::new(AppState {
            db: test_pool().await,
            config,
            realtime: Arc::new(RealtimeHub::new(16)),
        })
    }

    /// Full router without rate limiting or the outer middleware stack.
    pub async fn test_app() -> (Router, Arc<AppState>) {
        let state = test_state().await;
        let app = super::api_router()
            .nest("/api/auth", super::auth::router())
            .route("/health", get(super::health::health_check))
            .with_state(state.clone());
        (app, state)
    }

    pub async fn user_with_token(state: &Arc<AppState>, name: &str) -> (User, String) {
        let user = test_user(&state.db, name).await;
        let token = AuthService::create_jwt(&state.config.jwt, &user.id).unwrap();
        (user, token)
    }

    /// Send a request and decode the JSON body (`Value::Null` when empty).
    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
