use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Empty string disables the signup domain check.
    pub allowed_email_domain: String,
    pub welcome_bonus: i64,
    pub upload_points: i64,
    pub verify_bonus: i64,
    pub bcrypt_cost: u32,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub media: MediaConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Default)]
pub struct MediaConfig {
    pub cloud_name: Option<String>,
    pub upload_preset: String,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub papers_dir: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".into(),
            model: "llama-3.3-70b-versatile".into(),
            papers_dir: "papers".into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://studyvault.db".into(),
            port: 3030,
            allowed_email_domain: "slrtce.in".into(),
            welcome_bonus: 100,
            upload_points: 10,
            verify_bonus: 25,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            admin_email: None,
            admin_password: None,
            media: MediaConfig {
                cloud_name: None,
                upload_preset: "studyvault_notes".into(),
            },
            ai: AiConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ai_defaults = AiConfig::default();
        Self {
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            port: try_load("PORT", defaults.port),
            allowed_email_domain: var("ALLOWED_EMAIL_DOMAIN")
                .unwrap_or(defaults.allowed_email_domain),
            welcome_bonus: try_load("WELCOME_BONUS", defaults.welcome_bonus),
            upload_points: try_load("UPLOAD_POINTS", defaults.upload_points),
            verify_bonus: try_load("VERIFY_BONUS", defaults.verify_bonus),
            bcrypt_cost: try_load("BCRYPT_COST", defaults.bcrypt_cost),
            admin_email: var("ADMIN_EMAIL"),
            admin_password: var("ADMIN_PASSWORD"),
            media: MediaConfig {
                cloud_name: var("MEDIA_CLOUD_NAME").filter(|s| !s.is_empty()),
                upload_preset: var("MEDIA_UPLOAD_PRESET").unwrap_or(defaults.media.upload_preset),
            },
            ai: AiConfig {
                api_key: var("AI_API_KEY").filter(|s| !s.is_empty()),
                base_url: var("AI_BASE_URL").unwrap_or(ai_defaults.base_url),
                model: var("AI_MODEL").unwrap_or(ai_defaults.model),
                papers_dir: var("PAPERS_DIR").unwrap_or(ai_defaults.papers_dir),
            },
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
        Some(raw) => parse_or(key, &raw, default),
    }
}

fn parse_or<T>(key: &str, raw: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_numbers_fall_back() {
        assert_eq!(parse_or("PORT", "abc", 3030u16), 3030);
        assert_eq!(parse_or("PORT", " 8080 ", 3030u16), 8080);
        assert_eq!(parse_or("WELCOME_BONUS", "-", 100i64), 100);
    }
}
