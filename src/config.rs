use std::{env, fmt::Display, str::FromStr, sync::Arc, time::Duration};

use log::{info, warn};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::{
    constants::RECIPE_COUNT_PER_PAGE, error::QueryError, pagination::Page, postgres::PgStore,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable {0} is not set")]
    Missing(&'static str),

    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub session_secret: Arc<String>,
    pub max_connections: u32,
    pub page_size: i64,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, `env::var` in production.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: require(&lookup, "DATABASE_URL")?,
            session_secret: Arc::new(require(&lookup, "SESSION_SECRET")?),
            max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            page_size: try_load(&lookup, "PAGE_SIZE", RECIPE_COUNT_PER_PAGE)?,
        })
    }

    /// One-based page of `page_size` rows.
    pub fn page(&self, number: i64) -> Page {
        Page::number(number, self.page_size)
    }

    pub async fn connect(&self) -> Result<PgStore, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&self.database_url)
            .await?;

        info!("Connected to database with {} max connections", self.max_connections);

        Ok(PgStore::new(pool))
    }
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<String, ConfigError> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn try_load<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        }),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_to_optional_keys() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("SESSION_SECRET", "secret"),
        ]))
        .expect("config");

        assert_eq!(config.max_connections, 5);
        assert_eq!(config.page_size, RECIPE_COUNT_PER_PAGE);
        assert_eq!(config.session_secret.as_str(), "secret");
    }

    #[test]
    fn pages_use_the_configured_size() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("SESSION_SECRET", "secret"),
            ("PAGE_SIZE", "10"),
        ]))
        .expect("config");

        assert_eq!(config.page(1), Page::new(10, 0));
        assert_eq!(config.page(3), Page::new(10, 20));
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = Config::from_lookup(lookup(&[("SESSION_SECRET", "secret")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn malformed_numbers_are_reported() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("SESSION_SECRET", "secret"),
            ("PAGE_SIZE", "many"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "PAGE_SIZE", .. }));
    }
}
