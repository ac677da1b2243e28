use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::tasks::repo_types::Task;
use crate::tasks::services::{TaskDraft, TaskEdit};

/// Request body for CreateTask. The owner is always the caller.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
}

impl From<CreateTaskRequest> for TaskDraft {
    fn from(r: CreateTaskRequest) -> Self {
        Self {
            title: r.title,
            description: r.description,
            priority: r.priority,
            due_date: r.due_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskIdRequest {
    pub id: Uuid,
}

/// Request body for UpdateTask; omitted optional fields are cleared.
#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
}

impl UpdateTaskRequest {
    pub fn into_parts(self) -> (Uuid, TaskEdit) {
        let edit = TaskEdit {
            title: self.title,
            description: self.description,
            is_completed: self.is_completed,
            assignee_id: self.assignee_id,
            priority: self.priority,
            due_date: self.due_date,
        };
        (self.id, edit)
    }
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<Task>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_optional_fields_default() {
        let req: CreateTaskRequest = serde_json::from_str(r#"{"title":"T1"}"#).unwrap();
        assert_eq!(req.title, "T1");
        assert_eq!(req.description, "");
        assert!(req.priority.is_none());
        assert!(req.due_date.is_none());
    }

    #[test]
    fn update_request_parses_rfc3339_due_date() {
        let id = Uuid::new_v4();
        let body = format!(
            r#"{{"id":"{id}","title":"T","is_completed":true,"priority":"low","due_date":"2030-01-02T03:04:05Z"}}"#
        );
        let (parsed_id, edit) = serde_json::from_str::<UpdateTaskRequest>(&body)
            .unwrap()
            .into_parts();
        assert_eq!(parsed_id, id);
        assert!(edit.is_completed);
        assert_eq!(edit.priority.as_deref(), Some("low"));
        assert_eq!(edit.due_date.unwrap().year(), 2030);
    }

    #[test]
    fn null_due_date_is_accepted() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"title":"T1","due_date":null}"#).unwrap();
        assert!(req.due_date.is_none());
    }
}
