use async_trait::async_trait;
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Store, StoreError, UnitOfWork};
use crate::auth::{
    repo::{self as user_sql, UserRepo},
    repo_types::{NewUser, User},
};
use crate::tasks::{
    repo::{self as task_sql, TaskRepo},
    repo_types::{NewTask, Task},
};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    fn users(&self) -> &dyn UserRepo {
        self
    }

    fn tasks(&self) -> &dyn TaskRepo {
        self
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx: Mutex::new(tx) }))
    }
}

#[async_trait]
impl UserRepo for PgStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        user_sql::insert(&self.pool, &user).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        user_sql::find_by_email(&self.pool, email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        user_sql::find_by_id(&self.pool, id).await
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        user_sql::update(&self.pool, user).await
    }
}

#[async_trait]
impl TaskRepo for PgStore {
    async fn create(&self, task: NewTask) -> Result<(), StoreError> {
        task_sql::insert(&self.pool, &task).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        task_sql::find_by_id(&self.pool, id).await
    }

    async fn update(&self, task: &Task) -> Result<Task, StoreError> {
        task_sql::update(&self.pool, task).await
    }

    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        task_sql::list_by_owner(&self.pool, user_id).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        task_sql::delete(&self.pool, id).await
    }
}

/// Transaction-bound repositories. sqlx rolls the transaction back when it is
/// dropped uncommitted, so every exit path other than `commit` is a rollback.
pub struct PgUnitOfWork {
    tx: Mutex<Transaction<'static, Postgres>>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn users(&self) -> &dyn UserRepo {
        self
    }

    fn tasks(&self) -> &dyn TaskRepo {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.into_inner().commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.into_inner().rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepo for PgUnitOfWork {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tx = self.tx.lock().await;
        user_sql::insert(&mut **tx, &user).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let mut tx = self.tx.lock().await;
        user_sql::find_by_email(&mut **tx, email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let mut tx = self.tx.lock().await;
        user_sql::find_by_id(&mut **tx, id).await
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut tx = self.tx.lock().await;
        user_sql::update(&mut **tx, user).await
    }
}

#[async_trait]
impl TaskRepo for PgUnitOfWork {
    async fn create(&self, task: NewTask) -> Result<(), StoreError> {
        let mut tx = self.tx.lock().await;
        task_sql::insert(&mut **tx, &task).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let mut tx = self.tx.lock().await;
        task_sql::find_by_id(&mut **tx, id).await
    }

    async fn update(&self, task: &Task) -> Result<Task, StoreError> {
        let mut tx = self.tx.lock().await;
        task_sql::update(&mut **tx, task).await
    }

    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let mut tx = self.tx.lock().await;
        task_sql::list_by_owner(&mut **tx, user_id).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.tx.lock().await;
        task_sql::delete(&mut **tx, id).await
    }
}
