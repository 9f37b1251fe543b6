//! Process-level settings read from the environment (after `.env` via dotenvy).

use crate::error::ConfigError;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: Option<String>,
    /// File or directory holding entity JSON declarations.
    pub config_path: Option<String>,
    /// Schema for entities that do not name one. From `CRUD_SCHEMA`, default `public`.
    pub default_schema: String,
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: None,
            config_path: None,
            default_schema: "public".into(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            bind_addr: "0.0.0.0:3000".into(),
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (env, map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let non_empty = |key: &str| lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let parse_size = |key: &str, fallback: u64| -> Result<u64, ConfigError> {
            match non_empty(key) {
                Some(s) => s
                    .parse::<u64>()
                    .map_err(|_| ConfigError::Load(format!("{} must be a positive integer, got '{}'", key, s))),
                None => Ok(fallback),
            }
        };
        let settings = Settings {
            database_url: non_empty("DATABASE_URL"),
            config_path: non_empty("CONFIG_PATH"),
            default_schema: non_empty("CRUD_SCHEMA").unwrap_or(defaults.default_schema),
            default_page_size: parse_size("CRUD_DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: parse_size("CRUD_MAX_PAGE_SIZE", defaults.max_page_size)?,
            bind_addr: non_empty("CRUD_BIND_ADDR").unwrap_or(defaults.bind_addr),
        };
        if settings.default_page_size == 0 || settings.max_page_size == 0 {
            return Err(ConfigError::Load("page sizes must be at least 1".into()));
        }
        Ok(settings)
    }
}
