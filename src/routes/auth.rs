use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::services::auth::{
    validate_lang, validate_name, AuthService, LoginRequest, RegisterRequest,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me).put(update_me))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    /// Empty string resets to the default language.
    pub lang: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let user = AuthService::register(&state.db, request).await?;
    let token = AuthService::create_jwt(&state.config.jwt, &user.id)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = AuthService::login(&state.db, request).await?;
    let token = AuthService::create_jwt(&state.config.jwt, &user.id)?;
    Ok(Json(AuthResponse { token, user }))
}

async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(request): Json<UpdateMeRequest>,
) -> AppResult<Json<User>> {
    let name = request.name.as_deref().map(validate_name).transpose()?;
    let lang = match request.lang.as_deref().map(str::trim) {
        None => None,
        Some("") => Some(None),
        Some(lang) => Some(Some(validate_lang(lang)?)),
    };

    let updated = UserRepository::update_profile(
        &state.db,
        &user.id,
        name.as_deref(),
        lang.as_ref().map(|l| l.as_deref()),
    )
    .await?;

    Ok(Json(updated))
}

// ============================================================================
// Auth Extractor
// ============================================================================

/// Extractor for authenticated user
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
            tracing::debug!("Authorization header doesn't start with 'Bearer '");
            return Err(AppError::Unauthorized);
        }

        let token = auth_header[7..].trim();
        if token.is_empty() {
            tracing::debug!("Empty bearer token in Authorization header");
            return Err(AppError::Unauthorized);
        }

        let user = AuthService::get_user_from_token(state, token)
            .await
            .map_err(|e| {
                tracing::debug!("Failed to get user from token: {:?}", e);
                AppError::Unauthorized
            })?;

        tracing::debug!("Authenticated user: {}", user.id);
        Ok(AuthUser(user))
    }
}
