use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::config::JwtConfig;
use crate::db::{CreateUser, User, UserRepository};
use crate::error::{AppError, AppResult};
use crate::i18n::{is_supported_language, normalize_language, t, t_with};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub struct AuthService;

impl AuthService {
    pub fn hash_password(password: &str) -> AppResult<String> {
        // Minimum bcrypt cost keeps the test suite fast.
        let cost = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };
        Ok(bcrypt::hash(password, cost)?)
    }

    pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
        Ok(bcrypt::verify(password, hash)?)
    }

    /// Create a signed JWT for a user id
    pub fn create_jwt(config: &JwtConfig, user_id: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(config.expiration_hours);
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Decode and validate a JWT, returning the claims
    pub fn decode_jwt(config: &JwtConfig, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Resolve the user a bearer token belongs to. Unknown users are unauthorized.
    pub async fn get_user_from_token(state: &Arc<AppState>, token: &str) -> AppResult<User> {
        let claims = Self::decode_jwt(&state.config.jwt, token)?;
        let user = UserRepository::find_by_id(&state.db, &claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;
        Ok(user)
    }

    pub async fn register(pool: &SqlitePool, req: RegisterRequest) -> AppResult<User> {
        let email = req.email.trim().to_lowercase();
        validate_email(&email)?;
        let name = validate_name(&req.name)?;
        if req.password.chars().count() < 8 {
            return Err(AppError::Validation(t("validation.password_too_short")));
        }
        let lang = req.lang.as_deref().map(validate_lang).transpose()?;

        let password_hash = Self::hash_password(&req.password)?;
        let user = UserRepository::create(
            pool,
            CreateUser {
                email,
                name,
                password_hash,
                lang,
            },
        )
        .await?;

        tracing::info!("Registered user {}", user.id);
        Ok(user)
    }

    pub async fn login(pool: &SqlitePool, req: LoginRequest) -> AppResult<User> {
        let user = UserRepository::find_by_email(pool, &req.email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !Self::verify_password(&req.password, &user.password_hash)? {
            tracing::debug!("Invalid password for user {}", user.id);
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }
}

pub fn validate_email(email: &str) -> AppResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(t("validation.invalid_email")))
    }
}

/// Trimmed display name, 1 to 100 characters.
pub fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > 100 {
        return Err(AppError::Validation(t("validation.invalid_name")));
    }
    Ok(name.to_string())
}

pub fn validate_lang(lang: &str) -> AppResult<String> {
    let lang = normalize_language(lang.trim());
    if !is_supported_language(&lang) {
        return Err(AppError::Validation(t_with(
            "error.unsupported_language",
            &[("lang", lang.as_str())],
        )));
    }
    Ok(lang)
}
