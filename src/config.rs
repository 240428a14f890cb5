use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub sweeper: SweeperConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for auth endpoints (register/login)
    pub auth_per_second: u32,
    /// Burst size for auth endpoints
    pub auth_burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Whether the expiry sweeper runs at all.
    pub enabled: bool,
    /// Seconds between sweeper ticks.
    pub interval_seconds: u64,
    /// Age in days after which EXPIRED notifications are deleted.
    pub expired_retention_days: i64,
    /// Age in days after which read notifications of any type are deleted. 0 disables.
    pub read_retention_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Per-channel buffer; slow subscribers skip events beyond this.
    pub channel_capacity: usize,
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL").unwrap_or(defaults.server.frontend_url),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    defaults.database.max_connections,
                ),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_hours: env_or("JWT_EXPIRATION_HOURS", defaults.jwt.expiration_hours),
            },
            rate_limit: RateLimitConfig {
                auth_per_second: env_or(
                    "RATE_LIMIT_AUTH_PER_SECOND",
                    defaults.rate_limit.auth_per_second,
                ),
                auth_burst: env_or("RATE_LIMIT_AUTH_BURST", defaults.rate_limit.auth_burst),
            },
            sweeper: SweeperConfig {
                enabled: env_flag("SWEEPER_ENABLED", defaults.sweeper.enabled),
                interval_seconds: env_or(
                    "SWEEPER_INTERVAL_SECONDS",
                    defaults.sweeper.interval_seconds,
                ),
                expired_retention_days: env_or(
                    "NOTIFICATION_RETENTION_DAYS",
                    defaults.sweeper.expired_retention_days,
                ),
                read_retention_days: env_or(
                    "READ_NOTIFICATION_RETENTION_DAYS",
                    defaults.sweeper.read_retention_days,
                ),
            },
            realtime: RealtimeConfig {
                channel_capacity: env_or(
                    "REALTIME_CHANNEL_CAPACITY",
                    defaults.realtime.channel_capacity,
                )
                .max(1),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:5173".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/taskshare.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_hours: 24,
            },
            rate_limit: RateLimitConfig {
                auth_per_second: 3,
                auth_burst: 10,
            },
            sweeper: SweeperConfig {
                enabled: true,
                interval_seconds: 3600,
                expired_retention_days: 30,
                read_retention_days: 90,
            },
            realtime: RealtimeConfig {
                channel_capacity: 64,
            },
        }
    }
}
