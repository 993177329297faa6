use anyhow::{Context, Result};

use crate::chat::registry::{MAX_CACHED_SESSIONS, SESSION_IDLE_TTL};

/// Default Gemini model when `GEMINI_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Chat history and versions fall back to an in-process store when unset.
    pub redis_url: Option<String>,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub port: u16,
    pub rust_log: String,
    /// Seconds a cached chat session may sit unused before eviction.
    pub session_idle_secs: u64,
    pub max_cached_sessions: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            session_idle_secs: std::env::var("SESSION_IDLE_SECS")
                .unwrap_or_else(|_| SESSION_IDLE_TTL.as_secs().to_string())
                .parse::<u64>()
                .context("SESSION_IDLE_SECS must be a whole number of seconds")?,
            max_cached_sessions: std::env::var("MAX_CACHED_SESSIONS")
                .unwrap_or_else(|_| MAX_CACHED_SESSIONS.to_string())
                .parse::<usize>()
                .context("MAX_CACHED_SESSIONS must be a positive integer")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
