use std::{env, str::FromStr};

use crate::{
    constants::{DEFAULT_SESSION_LIFETIME_HOURS, SHORT_CODE_DEFAULT_LENGTH, SHORT_CODE_MAX_LENGTH},
    error::Error,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub session_lifetime_hours: i64,
    pub short_code_length: usize,
    /// Scheme and host shareable recipe links are built on.
    pub short_link_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::from("postgres://localhost/recipes"),
            redis_url: String::from("redis://127.0.0.1/"),
            max_connections: 5,
            jwt_secret: String::from("secret"),
            session_lifetime_hours: DEFAULT_SESSION_LIFETIME_HOURS,
            short_code_length: SHORT_CODE_DEFAULT_LENGTH,
            short_link_base: String::from("http://localhost"),
        }
    }
}

impl Config {
    /// Reads `RECIPE_BOX_*` variables, after loading `.env` when one exists.
    pub fn from_env() -> Result<Self, Error> {
        if let Err(e) = dotenvy::dotenv() {
            log::trace!("> No .env loaded: {e}");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let defaults = Self::default();

        let config = Self {
            database_url: required(&lookup, "RECIPE_BOX_DATABASE_URL")?,
            redis_url: lookup("RECIPE_BOX_REDIS_URL").unwrap_or(defaults.redis_url),
            max_connections: parsed(&lookup, "RECIPE_BOX_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            jwt_secret: required(&lookup, "RECIPE_BOX_JWT_SECRET")?,
            session_lifetime_hours: parsed(&lookup, "RECIPE_BOX_SESSION_LIFETIME_HOURS")?
                .unwrap_or(defaults.session_lifetime_hours),
            short_code_length: parsed(&lookup, "RECIPE_BOX_SHORT_CODE_LENGTH")?
                .unwrap_or(defaults.short_code_length),
            short_link_base: lookup("RECIPE_BOX_SHORT_LINK_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.short_link_base),
        };

        if !(1..=SHORT_CODE_MAX_LENGTH).contains(&config.short_code_length) {
            return Err(Error::validation(
                "RECIPE_BOX_SHORT_CODE_LENGTH",
                format!("must be between 1 and {SHORT_CODE_MAX_LENGTH}"),
            ));
        }
        if config.session_lifetime_hours <= 0 {
            return Err(Error::validation(
                "RECIPE_BOX_SESSION_LIFETIME_HOURS",
                "must be positive",
            ));
        }

        Ok(config)
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<String, Error> {
    lookup(key).ok_or_else(|| Error::validation(key, "is not set"))
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, Error> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_e| Error::validation(key, format!("can't parse {value:?}"))),
        None => Ok(None),
    }
}
