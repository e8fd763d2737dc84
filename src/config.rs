use crate::error::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::fs;

/// Top-level configuration, read from `config.toml` at the working
/// directory. Every section has defaults so a missing file still yields a
/// runnable service; secrets never live here (see [`Secrets`]).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub route: RouteConfig,
    pub letters: LettersConfig,
    pub news: NewsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Delivery window defaults and the arrival heuristic constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Default service window start, "HH:MM".
    pub window_start: String,
    /// Default service window end, "HH:MM".
    pub window_end: String,
    /// Minutes until the first remaining stop.
    pub first_stop_minutes: i64,
    /// Additional minutes per subsequent remaining stop.
    pub per_stop_minutes: i64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            window_start: "11:30".to_string(),
            window_end: "14:30".to_string(),
            first_stop_minutes: 18,
            per_stop_minutes: 12,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LettersConfig {
    /// SQLite path for the journal store.
    pub db_path: String,
    /// Generative model identifier.
    pub model: String,
    /// Local hour/minute at which the daemon fires the daily job.
    pub send_hour: u32,
    pub send_minute: u32,
    pub from_name: String,
    pub from_email: String,
    pub subject_prefix: String,
}

impl Default for LettersConfig {
    fn default() -> Self {
        Self {
            db_path: "data/journal.db".to_string(),
            model: "gemini-pro".to_string(),
            send_hour: 8,
            send_minute: 0,
            from_name: "Daily Letter".to_string(),
            from_email: "letters@example.com".to_string(),
            subject_prefix: "Your morning letter".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub output_dir: String,
    /// Cap on parsed items per feed.
    pub per_source_limit: usize,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            output_dir: "output/cards".to_string(),
            per_source_limit: 10,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config file '{config_path}': {e}"))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Loads `config.toml` when present, otherwise falls back to defaults.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                tracing::info!("No usable config.toml ({e}), using defaults");
                Self::default()
            }
        }
    }
}

/// Credentials pulled from the environment (after `dotenv`), never from
/// `config.toml`.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub gemini_api_key: Option<String>,
    pub smtp_relay: Option<String>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            smtp_relay: env::var("SMTP_RELAY").ok(),
            smtp_user: env::var("SMTP_USER").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let config = Config::default();
        assert_eq!(config.route.first_stop_minutes, 18);
        assert_eq!(config.route.per_stop_minutes, 12);
        assert_eq!(config.route.window_end, "14:30");
        assert_eq!(config.news.per_source_limit, 10);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [route]
            first_stop_minutes = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.route.first_stop_minutes, 20);
        assert_eq!(config.route.per_stop_minutes, 12);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }
}
