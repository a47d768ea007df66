//! Engine configuration loaded from environment variables.
//!
//! The binary loads `.env.local` / `.env` from the repo root first (see
//! `main.rs`), so every key below may also live in those files.

use std::time::Duration;

/// Default SQLite database file.
pub const DEFAULT_DATABASE_PATH: &str = "story.db";

/// Default OpenAI-compatible LLM endpoint.
pub const DEFAULT_LLM_BASE_URL: &str = "http://localhost:11434";

/// Default story-generation model.
pub const DEFAULT_LLM_MODEL: &str = "llama3.2";

/// Default bound on parent-chain walks. Any real story is far shorter.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 10_000;

/// Default wait for a session's mutation lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub database_path: String,
    pub server_host: String,
    pub server_port: u16,
    pub llm_base_url: String,
    pub llm_model: String,
    pub max_chain_depth: usize,
    pub lock_timeout: Duration,
    pub cors_allowed_origins: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            cors_allowed_origins: None,
        }
    }
}

impl EngineConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// Unparseable numeric values fall back to defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let server_port = get("SERVER_PORT")
            .or_else(|| get("PORT"))
            .map(|raw| parse_or("SERVER_PORT", &raw, defaults.server_port))
            .unwrap_or(defaults.server_port);

        let max_chain_depth = get("STORY_MAX_CHAIN_DEPTH")
            .map(|raw| parse_or("STORY_MAX_CHAIN_DEPTH", &raw, defaults.max_chain_depth))
            .filter(|depth| *depth > 0)
            .unwrap_or(defaults.max_chain_depth);

        let lock_timeout = get("STORY_LOCK_TIMEOUT_MS")
            .map(|raw| parse_or("STORY_LOCK_TIMEOUT_MS", &raw, DEFAULT_LOCK_TIMEOUT_MS))
            .map(Duration::from_millis)
            .unwrap_or(defaults.lock_timeout);

        Self {
            database_path: get("STORY_DB").unwrap_or(defaults.database_path),
            server_host: get("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port,
            llm_base_url: get("LLM_BASE_URL")
                .or_else(|| get("OLLAMA_BASE_URL"))
                .unwrap_or(defaults.llm_base_url),
            llm_model: get("LLM_MODEL")
                .or_else(|| get("OLLAMA_MODEL"))
                .unwrap_or(defaults.llm_model),
            max_chain_depth,
            lock_timeout,
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS"),
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, raw: &str, default: T) -> T {
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = raw, default = %default, "Invalid config value, using default");
            default
        }
    }
}
