//! Postgres storage for Recall: users and sessions, categories, decks, cards
//! and quizzes.

pub mod models;
pub mod repositories;

use std::time::Duration;

use anyhow::Context;
use sqlx::{PgPool, Postgres, migrate::MigrateDatabase, postgres::PgPoolOptions};

/// Embedded migrations from this crate's `migrations/` folder
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Connect a pool of at most `max_connections` connections.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("failed to connect to database")
}

/// Create the database if it is missing, then bring its schema up to date.
pub async fn ensure_db_and_migrate(database_url: &str, pool: &PgPool) -> anyhow::Result<()> {
    if !Postgres::database_exists(database_url).await? {
        Postgres::create_database(database_url)
            .await
            .context("failed to create database")?;
    }

    MIGRATOR.run(pool).await.context("failed to run migrations")
}
