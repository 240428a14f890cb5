//! Server-Sent Events endpoint for live notifications and list updates.
//!
//! Browsers' `EventSource` cannot set headers, so the JWT may come in the
//! `token` query parameter instead of `Authorization`.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::db::{Permission, SubjectKind};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::auth::AuthService;
use crate::services::realtime::{Channel, RealtimeEvent};
use crate::services::sharing::require_access;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(subscribe))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub token: Option<String>,
    /// Comma separated list ids to follow.
    pub lists: Option<String>,
}

type EventStream = BoxStream<'static, Result<Event, axum::Error>>;

fn receiver_stream(rx: broadcast::Receiver<RealtimeEvent>) -> BoxStream<'static, RealtimeEvent> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((event, rx)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Live subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

/// One user's view of a list channel.
///
/// Ends after forwarding `list_deleted` or an `access_revoked` aimed at the
/// user; revocations of other users are not forwarded. A lagged receiver may
/// have missed its revocation, so access is checked again before continuing.
pub(crate) fn list_stream(
    pool: SqlitePool,
    list_id: String,
    user_id: String,
    rx: broadcast::Receiver<RealtimeEvent>,
) -> BoxStream<'static, RealtimeEvent> {
    stream::unfold(Some(rx), move |rx| {
        let pool = pool.clone();
        let list_id = list_id.clone();
        let user_id = user_id.clone();
        async move {
            let Some(mut rx) = rx else {
                return None;
            };
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let last = match &event {
                            RealtimeEvent::ListDeleted { .. } => true,
                            RealtimeEvent::AccessRevoked { user_id: revoked, .. } => {
                                if *revoked != user_id {
                                    continue;
                                }
                                true
                            }
                            _ => false,
                        };
                        if last {
                            tracing::debug!("User {} stops following list {}", user_id, list_id);
                            return Some((event, None));
                        }
                        return Some((event, Some(rx)));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(
                            "List {} subscriber lagged, skipped {} events",
                            list_id,
                            skipped
                        );
                        match require_access(
                            &pool,
                            SubjectKind::List,
                            &list_id,
                            &user_id,
                            Permission::View,
                        )
                        .await
                        {
                            Ok(_) => {}
                            Err(AppError::Forbidden) | Err(AppError::NotFound(_)) => return None,
                            Err(e) => {
                                tracing::warn!(
                                    "Could not recheck access of user {} to list {}: {:?}",
                                    user_id,
                                    list_id,
                                    e
                                );
                            }
                        }
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }
    })
    .boxed()
}

async fn subscribe(
    State(state): State<Arc<AppState>>,
    header_user: Option<AuthUser>,
    Query(query): Query<EventsQuery>,
) -> AppResult<Sse<EventStream>> {
    let user = match (header_user, query.token.as_deref()) {
        (Some(AuthUser(user)), _) => user,
        (None, Some(token)) if !token.is_empty() => {
            AuthService::get_user_from_token(&state, token)
                .await
                .map_err(|e| {
                    tracing::debug!("Rejected live channel token: {:?}", e);
                    AppError::Unauthorized
                })?
        }
        _ => return Err(AppError::Unauthorized),
    };

    let mut streams = vec![receiver_stream(
        state.realtime.subscribe(Channel::User(user.id.clone())).await,
    )];

    let mut requested: Vec<&str> = query
        .lists
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect();
    requested.sort_unstable();
    requested.dedup();

    for list_id in requested {
        match require_access(&state.db, SubjectKind::List, list_id, &user.id, Permission::View)
            .await
        {
            Ok(_) => {
                let rx = state.realtime.subscribe(Channel::List(list_id.to_string())).await;
                streams.push(list_stream(
                    state.db.clone(),
                    list_id.to_string(),
                    user.id.clone(),
                    rx,
                ));
            }
            Err(AppError::Forbidden) | Err(AppError::NotFound(_)) => {
                tracing::debug!("User {} may not follow list {}", user.id, list_id);
            }
            Err(e) => return Err(e),
        }
    }

    tracing::debug!(
        "User {} connected to live channel ({} subscriptions)",
        user.id,
        streams.len()
    );

    let events: EventStream = stream::select_all(streams)
        .map(|event| Event::default().event(event.name()).json_data(&event))
        .boxed();

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
