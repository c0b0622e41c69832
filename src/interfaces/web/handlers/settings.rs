use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use super::super::AppState;

fn masked(secret: &str) -> String {
    if secret.len() > 8 {
        format!("{}...{}", &secret[..4], &secret[secret.len() - 4..])
    } else if secret.is_empty() {
        String::new()
    } else {
        "*".repeat(secret.len())
    }
}

/// Settings are sourced from the environment and exposed read-only.
pub async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    let settings = json!([
        {
            "key": "TELEGRAM_BOT_TOKEN",
            "value": masked(&state.config.telegram_bot_token),
            "description": "Telegram bot token (read-only, set via the environment)"
        },
        {
            "key": "TELEGRAM_WHITELIST",
            "value": state.config.telegram_whitelist,
            "description": "Telegram whitelist, comma-separated chat IDs (read-only, set via the environment)"
        }
    ]);
    (StatusCode::OK, Json(settings))
}

pub async fn update_setting(Path(_key): Path<String>) -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": "Settings are read-only. Please update the .env file and restart the server."
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::masked;

    #[test]
    fn masking_keeps_only_the_edges() {
        assert_eq!(masked("1234567890abcdef"), "1234...cdef");
        assert_eq!(masked("short"), "*****");
        assert_eq!(masked(""), "");
    }
}
