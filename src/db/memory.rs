use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, StoreError, UnitOfWork};
use crate::auth::{
    repo::UserRepo,
    repo_types::{NewUser, User},
};
use crate::tasks::{
    repo::TaskRepo,
    repo_types::{NewTask, Task},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tasks: HashMap<Uuid, Task>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn create_user(&mut self, new: NewUser) -> Result<User, StoreError> {
        if self.users.contains_key(&new.id) || self.email_taken(&new.email, None) {
            return Err(StoreError::Conflict("user already exists".into()));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: new.id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn user_by_email(&self, email: &str) -> Option<User> {
        self.users.values().find(|u| u.email == email).cloned()
    }

    fn update_user(&mut self, user: &User) -> Result<User, StoreError> {
        if self.email_taken(&user.email, Some(user.id)) {
            return Err(StoreError::Conflict("user already exists".into()));
        }
        let stored = self
            .users
            .get_mut(&user.id)
            .ok_or(StoreError::NotFound("user"))?;
        stored.name = user.name.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    fn create_task(&mut self, new: NewTask) -> Result<(), StoreError> {
        if !self.users.contains_key(&new.user_id) {
            return Err(StoreError::Corrupt(format!("unknown owner {}", new.user_id)));
        }
        let now = OffsetDateTime::now_utc();
        let task = Task {
            id: new.id,
            title: new.title,
            description: new.description,
            is_completed: false,
            user_id: new.user_id,
            assignee_id: None,
            priority: new.priority,
            due_date: new.due_date,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(task.id, task);
        Ok(())
    }

    fn update_task(&mut self, task: &Task) -> Result<Task, StoreError> {
        let stored = self
            .tasks
            .get_mut(&task.id)
            .ok_or(StoreError::NotFound("task"))?;
        stored.title = task.title.clone();
        stored.description = task.description.clone();
        stored.is_completed = task.is_completed;
        stored.assignee_id = task.assignee_id;
        stored.priority = task.priority;
        stored.due_date = task.due_date;
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    fn tasks_by_owner(&self, user_id: Uuid) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }
}

/// In-process store for tests and local runs. A unit of work holds the table
/// lock for its whole lifetime and edits a private copy, so concurrent units
/// of work are serialized and an uncommitted one leaves no trace.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn users(&self) -> &dyn UserRepo {
        self
    }

    fn tasks(&self) -> &dyn TaskRepo {
        self
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let live = self.tables.clone().lock_owned().await;
        let work = StdMutex::new((*live).clone());
        Ok(Box::new(MemoryUnitOfWork { live, work }))
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        self.tables.lock().await.create_user(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.user_by_email(email))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        self.tables.lock().await.update_user(user)
    }
}

#[async_trait]
impl TaskRepo for MemoryStore {
    async fn create(&self, task: NewTask) -> Result<(), StoreError> {
        self.tables.lock().await.create_task(task)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tables.lock().await.tasks.get(&id).cloned())
    }

    async fn update(&self, task: &Task) -> Result<Task, StoreError> {
        self.tables.lock().await.update_task(task)
    }

    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        Ok(self.tables.lock().await.tasks_by_owner(user_id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.tables.lock().await.tasks.remove(&id);
        Ok(())
    }
}

pub struct MemoryUnitOfWork {
    live: OwnedMutexGuard<Tables>,
    work: StdMutex<Tables>,
}

impl MemoryUnitOfWork {
    fn work(&self) -> MutexGuard<'_, Tables> {
        self.work.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn users(&self) -> &dyn UserRepo {
        self
    }

    fn tasks(&self) -> &dyn TaskRepo {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork { mut live, work } = *self;
        *live = work.into_inner().unwrap_or_else(PoisonError::into_inner);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl UserRepo for MemoryUnitOfWork {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        self.work().create_user(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.work().user_by_email(email))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.work().users.get(&id).cloned())
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        self.work().update_user(user)
    }
}

#[async_trait]
impl TaskRepo for MemoryUnitOfWork {
    async fn create(&self, task: NewTask) -> Result<(), StoreError> {
        self.work().create_task(task)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.work().tasks.get(&id).cloned())
    }

    async fn update(&self, task: &Task) -> Result<Task, StoreError> {
        self.work().update_task(task)
    }

    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Task>, StoreError> {
        Ok(self.work().tasks_by_owner(user_id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.work().tasks.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::repo_types::Priority;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            name: "Ann".into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store.users().create(new_user("ann@x.com")).await.unwrap();
        let err = store.users().create(new_user("ann@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn dropped_unit_of_work_leaves_no_trace() {
        let store = MemoryStore::new();
        let user = store.users().create(new_user("ann@x.com")).await.unwrap();

        {
            let uow = store.begin().await.unwrap();
            let mut changed = user.clone();
            changed.name = "Changed".into();
            uow.users().update(&changed).await.unwrap();
            // dropped without commit
        }

        let stored = store.users().find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Ann");
    }

    #[tokio::test]
    async fn committed_unit_of_work_is_visible() {
        let store = MemoryStore::new();
        let user = store.users().create(new_user("ann@x.com")).await.unwrap();

        let uow = store.begin().await.unwrap();
        let mut changed = user.clone();
        changed.name = "Changed".into();
        uow.users().update(&changed).await.unwrap();
        uow.commit().await.unwrap();

        let stored = store.users().find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Changed");
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn explicit_rollback_discards_changes() {
        let store = MemoryStore::new();
        let owner = store.users().create(new_user("ann@x.com")).await.unwrap();

        let uow = store.begin().await.unwrap();
        uow.tasks()
            .create(NewTask {
                id: Uuid::new_v4(),
                title: "T1".into(),
                description: String::new(),
                user_id: owner.id,
                priority: Priority::High,
                due_date: None,
            })
            .await
            .unwrap();
        uow.rollback().await.unwrap();

        assert!(store.tasks().list_by_owner(owner.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_unknown_task_is_silent() {
        let store = MemoryStore::new();
        store.tasks().delete(Uuid::new_v4()).await.unwrap();
    }
}
