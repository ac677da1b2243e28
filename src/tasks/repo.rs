use async_trait::async_trait;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::StoreError;
use crate::tasks::repo_types::{NewTask, Task, TaskRow};

/// Persistence capabilities for tasks.
#[async_trait]
pub trait TaskRepo: Send + Sync {
    async fn create(&self, task: NewTask) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, StoreError>;
    /// Overwrite the mutable fields of `task` and return the stored row.
    async fn update(&self, task: &Task) -> Result<Task, StoreError>;
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError>;
    /// Delete by id. Deleting an unknown id is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

const TASK_COLUMNS: &str = "id, title, description, is_completed, user_id, assignee_id, \
                            priority, due_date, created_at, updated_at";

fn into_task(row: TaskRow) -> Result<Task, StoreError> {
    Task::try_from(row).map_err(|e| StoreError::Corrupt(e.to_string()))
}

pub(crate) async fn insert<'e, E>(db: E, task: &NewTask) -> Result<(), StoreError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO tasks (id, title, description, is_completed, user_id, priority, due_date)
        VALUES ($1, $2, $3, FALSE, $4, $5, $6)
        "#,
    )
    .bind(task.id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.user_id)
    .bind(task.priority.as_str())
    .bind(task.due_date)
    .execute(db)
    .await?;
    Ok(())
}

pub(crate) async fn find_by_id<'e, E>(db: E, id: Uuid) -> Result<Option<Task>, StoreError>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
    sqlx::query_as::<_, TaskRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .map(into_task)
        .transpose()
}

pub(crate) async fn update<'e, E>(db: E, task: &Task) -> Result<Task, StoreError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        r#"
        UPDATE tasks
           SET title = $2, description = $3, is_completed = $4, assignee_id = $5,
               priority = $6, due_date = $7, updated_at = now()
         WHERE id = $1
        RETURNING {TASK_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, TaskRow>(&sql)
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.is_completed)
        .bind(task.assignee_id)
        .bind(task.priority.as_str())
        .bind(task.due_date)
        .fetch_optional(db)
        .await?
        .ok_or(StoreError::NotFound("task"))?;
    into_task(row)
}

pub(crate) async fn list_by_owner<'e, E>(db: E, user_id: Uuid) -> Result<Vec<Task>, StoreError>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1 ORDER BY created_at");
    sqlx::query_as::<_, TaskRow>(&sql)
        .bind(user_id)
        .fetch_all(db)
        .await?
        .into_iter()
        .map(into_task)
        .collect()
}

pub(crate) async fn delete<'e, E>(db: E, id: Uuid) -> Result<(), StoreError>
where
    E: PgExecutor<'e>,
{
    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
