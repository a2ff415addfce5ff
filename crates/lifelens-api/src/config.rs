//! Server configuration from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_URL` | unset: in-memory store |
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `8000` |
//! | `VECTOR_STRATEGY` | `index` (`index` or `brute_force`) |
//! | `SIMILARITY_THRESHOLD` | `0.6` |
//! | `MAX_ITERATIONS` | `5` |
//! | `HISTORY_WINDOW` | `10` |
//! | `DB_MAX_CONNECTIONS` | `10` |
//! | `ALLOWED_ORIGINS` | `http://localhost:3000` |
//!
//! Model backend settings are read separately by
//! `lifelens_inference::OpenAIConfig::from_env`.

use std::str::FromStr;

use tracing::warn;

use lifelens_core::defaults::{HISTORY_WINDOW, MAX_ITERATIONS, SERVER_PORT, SIMILARITY_THRESHOLD};
use lifelens_search::VectorStrategy;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PostgreSQL URL. `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub vector_strategy: VectorStrategy,
    pub similarity_threshold: f32,
    pub max_iterations: usize,
    pub history_window: usize,
    pub db_max_connections: u32,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            host: DEFAULT_HOST.to_string(),
            port: SERVER_PORT,
            vector_strategy: VectorStrategy::default(),
            similarity_threshold: SIMILARITY_THRESHOLD,
            max_iterations: MAX_ITERATIONS,
            history_window: HISTORY_WINDOW,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparsable values fall back
    /// to their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            database_url: get("DATABASE_URL"),
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(get("PORT"), "PORT", defaults.port),
            vector_strategy: parse_or(get("VECTOR_STRATEGY"), "VECTOR_STRATEGY", defaults.vector_strategy),
            similarity_threshold: parse_or(
                get("SIMILARITY_THRESHOLD"),
                "SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            ),
            max_iterations: parse_or(get("MAX_ITERATIONS"), "MAX_ITERATIONS", defaults.max_iterations),
            history_window: parse_or(get("HISTORY_WINDOW"), "HISTORY_WINDOW", defaults.history_window),
            db_max_connections: parse_or(
                get("DB_MAX_CONNECTIONS"),
                "DB_MAX_CONNECTIONS",
                defaults.db_max_connections,
            ),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|v| split_origins(&v))
                .unwrap_or(defaults.allowed_origins),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = key, value = %raw, "Invalid value, using default");
            default
        }),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
