//! Task model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Row identifiers may be stored as integers or strings; both are kept opaque.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// A row of the `todos` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    pub user_id: String,
    /// Server-assigned; only used for ordering
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert payload for a new task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub completed: bool,
    pub user_id: String,
}

impl NewTask {
    /// Create an incomplete task owned by `user_id`.
    ///
    /// The title is trimmed; an empty result is rejected.
    pub fn new(title: &str, user_id: impl Into<String>) -> crate::Result<Self> {
        let title = normalize_title(title)
            .ok_or_else(|| crate::Error::InvalidInput("task title is empty".into()))?;
        Ok(Self {
            title,
            completed: false,
            user_id: user_id.into(),
        })
    }
}

/// Partial update of a task; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            completed: None,
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            title: None,
            completed: Some(completed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none()
    }
}

/// Which task is being inline-edited and its draft title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditingState {
    pub task_id: String,
    pub title: String,
}

impl EditingState {
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
        }
    }
}

/// Trim a user-entered title; `None` when nothing is left
pub fn normalize_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
