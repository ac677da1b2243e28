use std::{fmt, str::FromStr};

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Absent means the default priority; anything other than the three
    /// lowercase names is rejected.
    pub fn parse_optional(raw: Option<&str>) -> Result<Self, ServiceError> {
        match raw {
            None => Ok(Self::default()),
            Some(s) => s.parse(),
        }
    }
}

impl FromStr for Priority {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(ServiceError::validation(format!("invalid priority: {other:?}"))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task as the rest of the crate sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub user_id: Uuid, // owner, immutable
    pub assignee_id: Option<Uuid>,
    pub priority: Priority,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Raw `tasks` row; priority is kept as text in the database.
#[derive(Debug, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_completed: bool,
    pub user_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub priority: String,
    pub due_date: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<TaskRow> for Task {
    type Error = ServiceError;

    fn try_from(r: TaskRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            title: r.title,
            description: r.description.unwrap_or_default(),
            is_completed: r.is_completed,
            user_id: r.user_id,
            assignee_id: r.assignee_id,
            priority: r.priority.parse()?,
            due_date: r.due_date,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Values for a task that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub user_id: Uuid,
    pub priority: Priority,
    pub due_date: Option<OffsetDateTime>,
}

/// Mutable fields of a task; applied as a full overwrite.
#[derive(Debug, Clone)]
pub struct TaskChanges {
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub assignee_id: Option<Uuid>,
    pub priority: Priority,
    pub due_date: Option<OffsetDateTime>,
}

impl Task {
    pub fn apply(&mut self, changes: TaskChanges) {
        self.title = changes.title;
        self.description = changes.description;
        self.is_completed = changes.is_completed;
        self.assignee_id = changes.assignee_id;
        self.priority = changes.priority;
        self.due_date = changes.due_date;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_three_priorities() {
        for (raw, expected) in [
            ("high", Priority::High),
            ("medium", Priority::Medium),
            ("low", Priority::Low),
        ] {
            assert_eq!(raw.parse::<Priority>().unwrap(), expected);
            assert_eq!(expected.to_string(), raw);
        }
    }

    #[test]
    fn rejects_other_priorities() {
        for raw in ["", "HIGH", "urgent", " low"] {
            let err = raw.parse::<Priority>().unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{raw:?}");
        }
    }

    #[test]
    fn absent_priority_defaults_to_medium() {
        assert_eq!(Priority::parse_optional(None).unwrap(), Priority::Medium);
        assert!(Priority::parse_optional(Some("critical")).is_err());
    }

    #[test]
    fn row_with_null_description_maps_to_empty() {
        let now = OffsetDateTime::now_utc();
        let row = TaskRow {
            id: Uuid::new_v4(),
            title: "T1".into(),
            description: None,
            is_completed: false,
            user_id: Uuid::new_v4(),
            assignee_id: None,
            priority: "low".into(),
            due_date: None,
            created_at: now,
            updated_at: now,
        };
        let task = Task::try_from(row).unwrap();
        assert_eq!(task.description, "");
        assert_eq!(task.priority, Priority::Low);
    }
}
