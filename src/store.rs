//! SQLite-backed store for accounts, calendars and events.

mod accounts;
mod calendars;
mod events;

use async_trait::async_trait;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{Sqlite, SqlitePool, SqlitePoolOptions},
};

use crate::models::{EventDraft, EventUpdate, UnknownVariant};

pub use calendars::SyncRecord;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `url` and run migrations
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?;
        }

        let pool = SqlitePool::connect(url).await?;
        Self::from_pool(pool).await
    }

    /// Private in-memory database, used by tests and dry runs.
    ///
    /// Every pooled connection to `:memory:` is its own database, so the pool
    /// is pinned to a single long-lived connection.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

/// Write side used by the change applier and the static importer
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert all drafts in one transaction; returns the number of rows written
    async fn insert_events(&self, drafts: &[EventDraft]) -> Result<u64, sqlx::Error>;

    /// Rewrite all rows in one transaction; returns the number of rows touched
    async fn update_events(&self, updates: &[EventUpdate]) -> Result<u64, sqlx::Error>;

    /// Delete the event keyed by (calendar, source id); `false` if it was absent
    async fn delete_event(&self, calendar_id: i64, source_id: &str) -> Result<bool, sqlx::Error>;
}

fn decode_error(err: UnknownVariant) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}
