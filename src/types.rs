use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Id carried by a task that has not been created on the server yet.
pub const NEW_TASK_ID: i64 = 0;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "inProgress",
            TaskStatus::Done => "done",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }

    /// Total parse used at the wire boundary: anything unrecognized lands in `Todo`.
    pub fn from_raw_status(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }

    fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "todo" => Some(TaskStatus::Todo),
            "inprogress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| {
            format!("unknown status '{value}' (expected one of: todo, inProgress, done)")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct UserRef {
    pub id: i64,
    pub username: Option<String>,
}

impl UserRef {
    pub fn new(id: i64) -> Self {
        Self { id, username: None }
    }

    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| format!("user#{}", self.id))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub assigned_user: Option<UserRef>,
    pub created_by: Option<UserRef>,
    pub created_date: String,
    pub modified_date: String,
}

impl Task {
    /// Unsaved task for the create flow.
    pub fn draft(project_id: i64, status: TaskStatus, created_by: Option<UserRef>) -> Self {
        Self {
            id: NEW_TASK_ID,
            project_id,
            status,
            created_by,
            ..Self::default()
        }
    }

    pub fn is_new(&self) -> bool {
        self.id == NEW_TASK_ID
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Overlays every field the server sent back.
    pub fn merge(&mut self, patch: &TaskPatch) {
        if let Some(id) = patch.id.filter(|id| *id != NEW_TASK_ID) {
            self.id = id;
        }
        if let Some(project_id) = patch.project_id {
            self.project_id = project_id;
        }
        if let Some(title) = patch.title.as_ref() {
            self.title = title.clone();
        }
        if let Some(description) = patch.description.as_ref() {
            self.description = description.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(user) = patch.assigned_user.as_ref() {
            self.assigned_user = Some(user.clone());
        }
        if let Some(user) = patch.created_by.as_ref() {
            self.created_by = Some(user.clone());
        }
        if let Some(created_date) = patch.created_date.as_ref() {
            self.created_date = created_date.clone();
        }
        if let Some(modified_date) = patch.modified_date.as_ref() {
            self.modified_date = modified_date.clone();
        }
    }
}

/// Fields returned by a create or update call. Absent fields keep the local value.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TaskPatch {
    pub id: Option<i64>,
    pub project_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub assigned_user: Option<UserRef>,
    pub created_by: Option<UserRef>,
    pub created_date: Option<String>,
    pub modified_date: Option<String>,
}

impl TaskPatch {
    pub fn persisted_id(&self) -> Option<i64> {
        self.id.filter(|id| *id != NEW_TASK_ID)
    }

    pub fn into_task(self) -> Task {
        let mut task = Task::default();
        task.merge(&self);
        task
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub users: Vec<UserRef>,
    pub tasks: Vec<Task>,
}

impl Project {
    pub fn has_member(&self, user_id: i64) -> bool {
        self.users.iter().any(|user| user.id == user_id)
    }
}
