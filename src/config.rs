use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub auth: AuthConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider.
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Seconds a typing indicator stays live without a refresh.
    pub typing_ttl_secs: u64,
    /// WebSocket heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Seconds of heartbeat silence before a connection is dropped.
    pub client_timeout_secs: u64,
    /// Default history page size.
    pub default_page_limit: usize,
    /// Hard cap on any page size.
    pub max_page_limit: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            typing_ttl_secs: 3,
            heartbeat_interval_secs: 5,
            client_timeout_secs: 30,
            default_page_limit: 20,
            max_page_limit: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let parse_u64 = |key: &str, default: u64| -> AppResult<u64> {
            match std::env::var(key) {
                Ok(v) => v
                    .parse()
                    .map_err(|e| AppError::Config(format!("{key}: {e}"))),
                Err(_) => Ok(default),
            }
        };

        let defaults = RealtimeConfig::default();

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .map_err(|e| AppError::Config(format!("APP_PORT: {e}")))?,
            },
            auth: AuthConfig {
                jwt_secret: std::env::var("JWT_SECRET")
                    .unwrap_or_else(|_| "dev-secret-change-me".to_string()),
            },
            realtime: RealtimeConfig {
                typing_ttl_secs: parse_u64("TYPING_TTL_SECS", defaults.typing_ttl_secs)?,
                heartbeat_interval_secs: parse_u64(
                    "WS_HEARTBEAT_INTERVAL_SECS",
                    defaults.heartbeat_interval_secs,
                )?,
                client_timeout_secs: parse_u64(
                    "WS_CLIENT_TIMEOUT_SECS",
                    defaults.client_timeout_secs,
                )?,
                default_page_limit: parse_u64(
                    "DEFAULT_PAGE_LIMIT",
                    defaults.default_page_limit as u64,
                )? as usize,
                max_page_limit: parse_u64("MAX_PAGE_LIMIT", defaults.max_page_limit as u64)?
                    as usize,
            },
        })
    }
}
