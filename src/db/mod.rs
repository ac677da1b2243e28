//! Store abstraction: pool-bound repositories plus units of work that hand out
//! transaction-bound instances of the same repositories.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use thiserror::Error;

use crate::auth::repo::UserRepo;
use crate::config::AppConfig;
use crate::tasks::repo::TaskRepo;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    #[error("{0} vanished during update")]
    NotFound(&'static str),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            // users.email is the only unique constraint besides primary keys
            if db.is_unique_violation() {
                return StoreError::Conflict("user already exists".into());
            }
        }
        StoreError::Database(e)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    fn users(&self) -> &dyn UserRepo;
    fn tasks(&self) -> &dyn TaskRepo;

    /// Start a unit of work. Dropping it without `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

/// Scoped group of store operations committed or rolled back together.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn users(&self) -> &dyn UserRepo;
    fn tasks(&self) -> &dyn TaskRepo;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Commit `uow` when `result` is `Ok`, roll it back otherwise. The original
/// error is returned unchanged; a failed rollback is only logged.
pub async fn finish<T, E>(uow: Box<dyn UnitOfWork>, result: Result<T, E>) -> Result<T, E>
where
    E: From<StoreError>,
{
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Open the store named by `DATABASE_URL`. `memory://` selects the in-process
/// store; anything else is treated as a Postgres URL and migrated on connect.
pub async fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    if config.database_url.starts_with("memory://") {
        tracing::warn!("using in-memory store; data is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = PgStore::connect(&config.database_url, config.database_max_connections)
        .await
        .context("connect to database")?;
    postgres::MIGRATOR
        .run(store.pool())
        .await
        .context("run migrations")?;
    Ok(Arc::new(store))
}
