use async_trait::async_trait;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::db::StoreError;

/// Persistence capabilities for users. Implemented by pool-bound and
/// transaction-bound handles alike.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a user. A duplicate email is a [`StoreError::Conflict`].
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Persist name, email and hash of `user` and return the stored row.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

pub(crate) async fn insert<'e, E>(db: E, user: &NewUser) -> Result<User, StoreError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, User>(&sql)
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(db)
        .await?;
    Ok(row)
}

pub(crate) async fn find_by_email<'e, E>(db: E, email: &str) -> Result<Option<User>, StoreError>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub(crate) async fn find_by_id<'e, E>(db: E, id: Uuid) -> Result<Option<User>, StoreError>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub(crate) async fn update<'e, E>(db: E, user: &User) -> Result<User, StoreError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        r#"
        UPDATE users
           SET name = $2, email = $3, password_hash = $4, updated_at = now()
         WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_optional(db)
        .await?
        .ok_or(StoreError::NotFound("user"))
}
