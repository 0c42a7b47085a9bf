use std::{collections::HashMap, fs};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub bot_token: String,
    pub admin_user_id: Option<i64>,
    pub admin_chat_id: Option<i64>,
    pub referral_code: String,
    pub referral_link: String,
    pub brand_name: String,
    pub health_bind: String,
    pub rate_limit_seconds: u64,
    pub database_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_user_id: None,
            admin_chat_id: None,
            referral_code: "PROMO42".into(),
            referral_link: "https://example.com/signup?ref=PROMO42".into(),
            brand_name: "Referral Bonus Bot".into(),
            health_bind: "0.0.0.0:8080".into(),
            rate_limit_seconds: 3,
            database_url: "sqlite://./data/bot.db".into(),
        }
    }
}

/// Defaults, overridden by a flat `bot.toml` next to the binary, overridden
/// by environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("bot.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("bot_token") {
                settings.bot_token = v.clone();
            }
            if let Some(v) = file_cfg.get("admin_user_id") {
                settings.admin_user_id = v.parse().ok();
            }
            if let Some(v) = file_cfg.get("admin_chat_id") {
                settings.admin_chat_id = v.parse().ok();
            }
            if let Some(v) = file_cfg.get("referral_code") {
                settings.referral_code = v.clone();
            }
            if let Some(v) = file_cfg.get("referral_link") {
                settings.referral_link = v.clone();
            }
            if let Some(v) = file_cfg.get("brand_name") {
                settings.brand_name = v.clone();
            }
            if let Some(v) = file_cfg.get("health_bind") {
                settings.health_bind = v.clone();
            }
            if let Some(v) = file_cfg.get("rate_limit_seconds") {
                if let Ok(parsed) = v.parse() {
                    settings.rate_limit_seconds = parsed;
                }
            }
            if let Some(v) = file_cfg.get("database_url") {
                settings.database_url = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("BOT_TOKEN") {
        settings.bot_token = v;
    }
    if let Ok(v) = std::env::var("ADMIN_USER_ID") {
        settings.admin_user_id = v.parse().ok();
    }
    if let Ok(v) = std::env::var("ADMIN_CHANNEL_ID") {
        settings.admin_chat_id = v.parse().ok();
    }
    if let Ok(v) = std::env::var("REF_CODE") {
        settings.referral_code = v;
    }
    if let Ok(v) = std::env::var("REF_LINK") {
        settings.referral_link = v;
    }
    if let Ok(v) = std::env::var("BRAND_NAME") {
        settings.brand_name = v;
    }
    if let Ok(v) = std::env::var("PORT") {
        if let Ok(port) = v.parse::<u16>() {
            settings.health_bind = format!("0.0.0.0:{port}");
        }
    }
    if let Ok(v) = std::env::var("HEALTH_BIND") {
        settings.health_bind = v;
    }
    if let Ok(v) = std::env::var("RATE_LIMIT_SECONDS") {
        if let Ok(parsed) = v.parse() {
            settings.rate_limit_seconds = parsed;
        }
    }
    if let Ok(v) = std::env::var("DB_PATH") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }

    settings
}

/// Accepts a bare file path for convenience and turns it into a sqlite URL;
/// full URLs pass through untouched.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_plain_file_path_to_sqlite_url() {
        assert_eq!(normalize_database_url("./data/bot.db"), "sqlite://./data/bot.db");
        assert_eq!(normalize_database_url("sqlite:bot.db"), "sqlite://bot.db");
    }

    #[test]
    fn leaves_full_urls_untouched() {
        assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_database_url("sqlite://./data/bot.db"),
            "sqlite://./data/bot.db"
        );
    }

    #[test]
    fn empty_url_falls_back_to_default() {
        assert_eq!(normalize_database_url("  "), Settings::default().database_url);
    }

    #[test]
    fn defaults_match_original_deployment() {
        let settings = Settings::default();
        assert_eq!(settings.referral_code, "PROMO42");
        assert_eq!(settings.rate_limit_seconds, 3);
        assert_eq!(settings.health_bind, "0.0.0.0:8080");
    }
}
