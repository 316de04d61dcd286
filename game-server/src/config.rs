use anyhow::{Context, Result};
use std::env;
use std::fmt::Display;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

const DEV_SECRET_KEY: &str = "twenty-questions-dev-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// Externally visible base URL, used for the OAuth redirect URI
    pub public_url: String,
    pub database_url: String,
    pub secret_key: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub word_list_path: String,
    pub static_dir: String,
    pub session_ttl_hours: u64,
    pub game_session_timeout_minutes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let port = parse_var("PORT", defaults.port)?;

        let secret_key = match env::var("SECRET_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                tracing::warn!("SECRET_KEY is not set; using an insecure development key");
                DEV_SECRET_KEY.to_string()
            }
        };

        Ok(Self {
            host: parse_var("HOST", defaults.host)?,
            port,
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", port))
                .trim_end_matches('/')
                .to_string(),
            database_url: var_or("DATABASE_URL", &defaults.database_url),
            secret_key,
            google_client_id: var_or("GOOGLE_CLIENT_ID", &defaults.google_client_id),
            google_client_secret: var_or("GOOGLE_CLIENT_SECRET", &defaults.google_client_secret),
            google_api_key: var_or("GOOGLE_API_KEY", &defaults.google_api_key),
            gemini_model: var_or("GEMINI_MODEL", &defaults.gemini_model),
            gemini_base_url: var_or("GEMINI_BASE_URL", &defaults.gemini_base_url),
            word_list_path: var_or("WORD_LIST_PATH", &defaults.word_list_path),
            static_dir: var_or("STATIC_DIR", &defaults.static_dir),
            session_ttl_hours: parse_var("SESSION_TTL_HOURS", defaults.session_ttl_hours)?,
            game_session_timeout_minutes: parse_var(
                "GAME_SESSION_TIMEOUT_MINUTES",
                defaults.game_session_timeout_minutes,
            )?,
        })
    }

    pub fn redirect_uri(&self) -> String {
        format!("{}/authorize", self.public_url)
    }

    pub fn uses_https(&self) -> bool {
        self.public_url.starts_with("https://")
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_hours * 3600)
    }

    pub fn game_session_timeout(&self) -> Duration {
        Duration::from_secs(self.game_session_timeout_minutes * 60)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 5000,
            public_url: "http://localhost:5000".to_string(),
            database_url: "sqlite://twenty_questions.db?mode=rwc".to_string(),
            secret_key: DEV_SECRET_KEY.to_string(),
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_api_key: String::new(),
            gemini_model: "gemini-2.0-flash-exp".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            word_list_path: "data/items.txt".to_string(),
            static_dir: "./static".to_string(),
            session_ttl_hours: 168,
            game_session_timeout_minutes: 30,
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid {}: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.redirect_uri(), "http://localhost:5000/authorize");
        assert!(!config.uses_https());
        assert_eq!(config.game_session_timeout(), Duration::from_secs(1800));
        assert_eq!(config.session_ttl(), Duration::from_secs(168 * 3600));
    }

    #[test]
    fn test_parse_var_reports_bad_values() {
        // Unique name so parallel tests never see it
        let name = "TQ_TEST_PARSE_VAR_BAD_PORT";
        unsafe { env::set_var(name, "not-a-port") };
        let result: Result<u16> = parse_var(name, 1);
        unsafe { env::remove_var(name) };

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Invalid TQ_TEST_PARSE_VAR_BAD_PORT"));
    }

    #[test]
    fn test_parse_var_falls_back_to_default() {
        let value: u64 = parse_var("TQ_TEST_PARSE_VAR_UNSET", 42).unwrap();
        assert_eq!(value, 42);
    }
}
