//! Dotenv files for the backend and frontend.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

use crate::StackConfig;

/// Placeholder written in place of secrets in `.env.example` files.
pub const REDACTED_PLACEHOLDER: &str = "your_password_here";

/// Generate a framework encryption key: `base64:` followed by the base64
/// encoding of 32 random bytes.
pub fn generate_app_key() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    format!("base64:{}", STANDARD.encode(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EnvLine {
    Blank,
    Var { key: String, value: String },
}

/// An ordered dotenv file, grouped by blank lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    lines: Vec<EnvLine>,
}

impl EnvFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `KEY=value`.
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.lines.push(EnvLine::Var {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Append an empty separator line.
    pub fn blank(mut self) -> Self {
        self.lines.push(EnvLine::Blank);
        self
    }

    /// Value of `key`, if set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            EnvLine::Var { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// A copy with the value of `key` replaced by `placeholder`.
    ///
    /// Only that key changes, even when other values contain the same text.
    pub fn redacted(&self, key: &str, placeholder: &str) -> Self {
        let lines = self
            .lines
            .iter()
            .map(|line| match line {
                EnvLine::Var { key: k, .. } if k == key => EnvLine::Var {
                    key: k.clone(),
                    value: placeholder.to_string(),
                },
                other => other.clone(),
            })
            .collect();
        Self { lines }
    }

    /// The backend environment for `config`, with the given key.
    pub fn backend(config: &StackConfig, app_key: &str) -> Self {
        let db = &config.database;
        let backend_url = format!("http://localhost:{}", config.ports.backend);

        Self::new()
            .var("APP_NAME", &config.app_name)
            .var("APP_ENV", "local")
            .var("APP_KEY", app_key)
            .var("APP_DEBUG", "true")
            .var("APP_URL", backend_url)
            .blank()
            .var("LOG_CHANNEL", "stack")
            .var("LOG_LEVEL", "debug")
            .blank()
            .var("DB_CONNECTION", "mysql")
            .var("DB_HOST", "mysql")
            .var("DB_PORT", "3306")
            .var("DB_DATABASE", &db.name)
            .var("DB_USERNAME", &db.user)
            .var("DB_PASSWORD", &db.password)
            .blank()
            .var("BROADCAST_DRIVER", "log")
            .var("CACHE_DRIVER", "redis")
            .var("FILESYSTEM_DISK", "local")
            .var("QUEUE_CONNECTION", "sync")
            .var("SESSION_DRIVER", "file")
            .var("SESSION_LIFETIME", "120")
            .blank()
            .var("REDIS_HOST", "redis")
            .var("REDIS_PASSWORD", "null")
            .var("REDIS_PORT", "6379")
            .blank()
            .var("MAIL_MAILER", "smtp")
            .var("MAIL_HOST", "mailhog")
            .var("MAIL_PORT", "1025")
            .var("MAIL_USERNAME", "null")
            .var("MAIL_PASSWORD", "null")
            .var("MAIL_ENCRYPTION", "null")
            .var("MAIL_FROM_ADDRESS", "hello@example.com")
            .var("MAIL_FROM_NAME", "${APP_NAME}")
    }

    /// The frontend environment for `config`.
    pub fn frontend(config: &StackConfig) -> Self {
        Self::new()
            .var("NEXT_PUBLIC_API_URL", &config.api_url)
            .var("NEXT_PUBLIC_SITE_URL", &config.site_url)
    }
}

/// Quote values the dotenv parsers would otherwise split or misread.
fn render_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '#' | '$' | '"' | '\'' | '\\'));

    if !needs_quotes {
        return value.to_string();
    }

    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

impl fmt::Display for EnvFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match line {
                EnvLine::Blank => writeln!(f)?,
                EnvLine::Var { key, value } => writeln!(f, "{}={}", key, render_value(value))?,
            }
        }
        Ok(())
    }
}
