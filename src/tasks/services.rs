use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::{self, Store};
use crate::error::ServiceError;
use crate::tasks::repo_types::{NewTask, Priority, Task, TaskChanges};

/// Fields supplied when a task is created. `priority` is the raw wire value.
#[derive(Debug, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: Option<String>,
    pub due_date: Option<OffsetDateTime>,
}

/// Full replacement of a task's mutable fields.
#[derive(Debug, Default)]
pub struct TaskEdit {
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<String>,
    pub due_date: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn Store>,
}

impl TaskService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, draft))]
    pub async fn create(&self, owner: Uuid, draft: TaskDraft) -> Result<Uuid, ServiceError> {
        let priority = Priority::parse_optional(draft.priority.as_deref())?;
        let id = Uuid::new_v4();
        self.store
            .tasks()
            .create(NewTask {
                id,
                title: draft.title,
                description: draft.description,
                user_id: owner,
                priority,
                due_date: draft.due_date,
            })
            .await?;
        info!(task_id = %id, "task created");
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<Task, ServiceError> {
        self.store
            .tasks()
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound("task"))
    }

    /// Read-modify-write inside one unit of work. Every mutable field is
    /// overwritten; the returned task is what the store holds afterwards.
    #[instrument(skip(self, edit))]
    pub async fn update(&self, id: Uuid, edit: TaskEdit) -> Result<Task, ServiceError> {
        let changes = TaskChanges {
            title: edit.title,
            description: edit.description,
            is_completed: edit.is_completed,
            assignee_id: edit.assignee_id,
            priority: Priority::parse_optional(edit.priority.as_deref())?,
            due_date: edit.due_date,
        };

        let uow = self.store.begin().await?;
        let result: Result<Task, ServiceError> = async {
            let mut task = uow
                .tasks()
                .find_by_id(id)
                .await?
                .ok_or(ServiceError::NotFound("task"))?;
            task.apply(changes);
            Ok(uow.tasks().update(&task).await?)
        }
        .await;

        let task = db::finish(uow, result).await?;
        info!(task_id = %task.id, "task updated");
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn list(&self, owner: Uuid) -> Result<Vec<Task>, ServiceError> {
        Ok(self.store.tasks().list_by_owner(owner).await?)
    }

    /// Deleting an id that does not exist is not an error.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.store.tasks().delete(id).await?;
        info!(task_id = %id, "task deleted");
        Ok(())
    }
}
