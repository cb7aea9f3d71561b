//! Server configuration, read from the environment (and `.env`, loaded in `main`).

use std::env;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_DATABASE: &str = "SpendShare";
const DEFAULT_JWT_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("You need to add the {0} to the env")]
    Missing(&'static str),

    #[error("Invalid value for {0}")]
    InvalidValue(&'static str),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mongodb_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_lifetime_secs: i64,
    /// Browser origin allowed to call the API with credentials.
    pub client_url: Option<String>,
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        Ok(Config {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            mongodb_uri: required("MONGODB_URI")?,
            database_name: lookup("DATABASE_NAME").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_lifetime_secs: parse_or(&lookup, "JWT_LIFETIME_SECS", DEFAULT_JWT_LIFETIME_SECS)?,
            client_url: lookup("CLIENT_URL").filter(|url| !url.is_empty()),
            cookie_secure: parse_or(&lookup, "COOKIE_SECURE", false)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}
