mod catalog;
mod recipes;
mod relations;
mod subscriptions;
mod users;

use sqlx::{postgres::PgPoolOptions, Executor, Pool, Postgres};

use crate::config::Config;

use super::error::Error;

/// sqlx backed implementation of every repository trait.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        log::info!("Connected to database");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

pub async fn prepare_db(pool: &Pool<Postgres>) -> Result<(), Error> {
    pool.execute(include_str!("sql/schema.sql")).await?;
    Ok(())
}

/// Drops and recreates every table.
pub async fn initialize_db(pool: &Pool<Postgres>) -> Result<(), Error> {
    pool.execute(include_str!("sql/down.sql")).await?;
    pool.execute(include_str!("sql/schema.sql")).await?;
    Ok(())
}

/// Translates a constraint violation into a domain error; anything else stays a query error.
fn map_constraint(e: sqlx::Error, map: impl FnOnce(&str) -> Option<Error>) -> Error {
    let mapped = e
        .as_database_error()
        .and_then(|db| db.constraint())
        .and_then(map);

    match mapped {
        Some(mapped) => mapped,
        None => e.into(),
    }
}
