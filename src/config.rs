use tracing::debug;

/// Runtime configuration, loaded from the environment (with `.env` support).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub telegram_bot_token: String,
    /// Comma-separated Telegram chat IDs allowed to use the bot and targeted
    /// by notifications.
    pub telegram_whitelist: String,
    pub debug: bool,
}

impl Config {
    pub fn load() -> Self {
        if dotenvy::dotenv().is_err() {
            debug!("No .env file found, using environment variables");
        }

        Self {
            port: env_or("PORT", "8080").parse().unwrap_or(8080),
            database_url: env_or("DATABASE_URL", "taskdock.db"),
            telegram_bot_token: env_or("TELEGRAM_BOT_TOKEN", ""),
            telegram_whitelist: env_or("TELEGRAM_WHITELIST", ""),
            debug: env_or("DEBUG", "false") == "true",
        }
    }

    pub fn whitelist_ids(&self) -> Vec<i64> {
        self.telegram_whitelist
            .split(',')
            .filter_map(|id| id.trim().parse().ok())
            .collect()
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_parses_and_skips_garbage() {
        let config = Config {
            port: 8080,
            database_url: String::new(),
            telegram_bot_token: String::new(),
            telegram_whitelist: " 123, 456 ,not-a-number,789".to_string(),
            debug: false,
        };
        assert_eq!(config.whitelist_ids(), vec![123, 456, 789]);
    }

    #[test]
    fn empty_whitelist_is_empty() {
        let config = Config {
            port: 8080,
            database_url: String::new(),
            telegram_bot_token: String::new(),
            telegram_whitelist: String::new(),
            debug: false,
        };
        assert!(config.whitelist_ids().is_empty());
    }
}
