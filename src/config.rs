//! Service configuration.
//!
//! Everything is read from environment variables with sensible defaults so
//! that `cargo run --bin server` works out of the box against a local
//! SQLite file. Provider keys are optional: without `AI_API_KEY` the
//! chatbot answers 503, without `EMAIL_API_KEY` emails are only logged.
//! Both provider clients give up after their configured timeout.

use thiserror::Error;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    /// A number parsed but falls outside the accepted range.
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Longest accepted session lifetime (one year).
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

/// Completion-provider settings.
#[derive(Debug, Clone)]
pub struct ChatbotConfig {
    /// Bearer key for the completion API. `None` disables the chatbot.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API (no trailing slash).
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Number of most recent turns replayed to the model.
    pub max_history: usize,
    /// Whole-request timeout for completion calls.
    pub timeout_secs: u64,
}

/// Email-provider settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Bearer key for the email API. `None` switches to log-only delivery.
    pub api_key: Option<String>,
    /// Base URL of the v3 mail API.
    pub base_url: String,
    /// Sender address.
    pub from_address: String,
    /// Sender display name.
    pub from_name: String,
    /// Whole-request timeout for send calls.
    pub timeout_secs: u64,
}

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// SQLite database path, or `:memory:`.
    pub database_path: String,
    /// Lifetime of a login session.
    pub session_ttl_hours: i64,
    /// Used to build links in notification emails.
    pub public_base_url: String,
    pub chatbot: ChatbotConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: get("HOST", "0.0.0.0"),
            port: parse("PORT", get("PORT", "8080"))?,
            database_path: get("DATABASE_PATH", "tutorhub.db"),
            session_ttl_hours: bounded(
                "SESSION_TTL_HOURS",
                parse("SESSION_TTL_HOURS", get("SESSION_TTL_HOURS", "168"))?,
                1,
                MAX_SESSION_TTL_HOURS,
            )?,
            public_base_url: get("PUBLIC_BASE_URL", "http://localhost:8080")
                .trim_end_matches('/')
                .to_string(),
            chatbot: ChatbotConfig {
                api_key: optional("AI_API_KEY"),
                base_url: get("AI_BASE_URL", "https://api.openai.com/v1")
                    .trim_end_matches('/')
                    .to_string(),
                model: get("AI_MODEL", "gpt-4o-mini"),
                temperature: parse("AI_TEMPERATURE", get("AI_TEMPERATURE", "0.3"))?,
                max_history: parse("AI_MAX_HISTORY", get("AI_MAX_HISTORY", "20"))?,
                timeout_secs: bounded(
                    "AI_TIMEOUT_SECS",
                    parse("AI_TIMEOUT_SECS", get("AI_TIMEOUT_SECS", "60"))?,
                    1,
                    600,
                )? as u64,
            },
            mail: MailConfig {
                api_key: optional("EMAIL_API_KEY"),
                base_url: get("EMAIL_BASE_URL", "https://api.sendgrid.com/v3")
                    .trim_end_matches('/')
                    .to_string(),
                from_address: get("EMAIL_FROM", "no-reply@tutorhub.local"),
                from_name: get("EMAIL_FROM_NAME", "TutorHub"),
                timeout_secs: bounded(
                    "EMAIL_TIMEOUT_SECS",
                    parse("EMAIL_TIMEOUT_SECS", get("EMAIL_TIMEOUT_SECS", "10"))?,
                    1,
                    120,
                )? as u64,
            },
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        // No variables set, every value falls back to its default.
        Self::from_lookup(|_| None).unwrap_or_else(|_| unreachable!("defaults always parse"))
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn bounded(name: &'static str, value: i64, min: i64, max: i64) -> Result<i64, ConfigError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange { name, value, min, max })
    }
}
