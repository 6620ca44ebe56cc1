//! Runtime settings read from the database at startup

use inkbase_common::db::{load_setting_i64, ACCESS_LOG_USER_AGENT_MAX_CHARS, HTTP_MAX_BODY_SIZE_BYTES};
use inkbase_common::Result;
use sqlx::SqlitePool;
use tracing::info;

const DEFAULT_USER_AGENT_MAX_CHARS: usize = 1000;
const DEFAULT_MAX_BODY_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Settings consulted on every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Longest user agent kept in an access-log row
    pub access_log_user_agent_max_chars: usize,
    /// Request body limit (signature payloads are base64 images)
    pub http_max_body_size_bytes: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            access_log_user_agent_max_chars: DEFAULT_USER_AGENT_MAX_CHARS,
            http_max_body_size_bytes: DEFAULT_MAX_BODY_SIZE_BYTES,
        }
    }
}

impl RuntimeSettings {
    /// Load from the settings table; negative values fall back to defaults
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();

        let ua = load_setting_i64(
            pool,
            ACCESS_LOG_USER_AGENT_MAX_CHARS,
            defaults.access_log_user_agent_max_chars as i64,
        )
        .await?;
        let body = load_setting_i64(
            pool,
            HTTP_MAX_BODY_SIZE_BYTES,
            defaults.http_max_body_size_bytes as i64,
        )
        .await?;

        let settings = Self {
            access_log_user_agent_max_chars: usize::try_from(ua)
                .unwrap_or(defaults.access_log_user_agent_max_chars),
            http_max_body_size_bytes: usize::try_from(body).unwrap_or(defaults.http_max_body_size_bytes),
        };

        info!(
            "Runtime settings: user agent limit {} chars, body limit {} bytes",
            settings.access_log_user_agent_max_chars, settings.http_max_body_size_bytes
        );

        Ok(settings)
    }
}
