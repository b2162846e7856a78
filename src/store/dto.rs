//! Wire shapes of the backend and their mapping to the domain model.
//!
//! Outgoing bodies are always snake_case. Incoming bodies are read
//! leniently: the backend answers some routes with camelCase dates and
//! embedded `{id, username}` objects instead of numeric foreign keys.

use serde::{Deserialize, Serialize};

use crate::types::{Project, Task, TaskPatch, TaskStatus, UserRef};

/// Embedded user object. A missing user row on the backend comes through
/// as `{"id": null, "username": null}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserDto {
    pub id: Option<i64>,
    pub username: Option<String>,
}

impl UserDto {
    pub fn into_user_ref(self) -> Option<UserRef> {
        self.id.map(|id| UserRef {
            id,
            username: self.username,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskDto {
    pub id: Option<i64>,
    #[serde(alias = "projectId")]
    pub project_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub assigned_user_id: Option<i64>,
    #[serde(rename = "assignedUser")]
    pub assigned_user: Option<UserDto>,
    pub created_by: Option<i64>,
    #[serde(rename = "createdBy")]
    pub created_by_user: Option<UserDto>,
    #[serde(alias = "createdDate")]
    pub created_date: Option<String>,
    #[serde(alias = "modifiedDate")]
    pub modified_date: Option<String>,
}

impl TaskDto {
    pub fn into_patch(self) -> TaskPatch {
        let assigned_user = self
            .assigned_user
            .and_then(UserDto::into_user_ref)
            .or_else(|| self.assigned_user_id.map(UserRef::new));
        let created_by = self
            .created_by_user
            .and_then(UserDto::into_user_ref)
            .or_else(|| self.created_by.map(UserRef::new));

        TaskPatch {
            id: self.id,
            project_id: self.project_id,
            title: self.title,
            description: self.description,
            status: self.status.as_deref().map(TaskStatus::from_raw_status),
            assigned_user,
            created_by,
            created_date: self.created_date,
            modified_date: self.modified_date,
        }
    }

    pub fn into_task(self) -> Task {
        self.into_patch().into_task()
    }
}

/// Create answers either with the task itself or `{"message": ..., "task": {...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TaskResponse {
    Envelope { task: TaskDto },
    Bare(TaskDto),
}

impl TaskResponse {
    pub fn into_patch(self) -> TaskPatch {
        match self {
            TaskResponse::Envelope { task } | TaskResponse::Bare(task) => task.into_patch(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct TaskPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub project_id: i64,
    pub title: String,
    pub description: String,
    pub status: &'static str,
    pub assigned_user_id: Option<i64>,
    pub user_id: Option<i64>,
    pub created_by: Option<i64>,
    pub created_date: String,
    pub modified_date: String,
}

impl TaskPayload {
    pub fn for_create(task: &Task, now: &str) -> Self {
        Self {
            id: None,
            ..Self::from_task(task, now)
        }
    }

    pub fn for_update(task: &Task, now: &str) -> Self {
        Self {
            id: Some(task.id),
            modified_date: now.to_string(),
            ..Self::from_task(task, now)
        }
    }

    fn from_task(task: &Task, now: &str) -> Self {
        let assigned_user_id = task.assigned_user.as_ref().map(|user| user.id);
        let created_by = task.created_by.as_ref().map(|user| user.id);

        Self {
            id: None,
            project_id: task.project_id,
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status.as_str(),
            assigned_user_id,
            user_id: assigned_user_id.or(created_by),
            created_by,
            created_date: non_empty_or(&task.created_date, now),
            modified_date: non_empty_or(&task.modified_date, now),
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectDto {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub users: Vec<UserDto>,
    #[serde(default)]
    pub tasks: Vec<TaskDto>,
}

impl From<ProjectDto> for Project {
    fn from(dto: ProjectDto) -> Self {
        Project {
            id: dto.id,
            name: dto.name.unwrap_or_default(),
            description: dto.description.unwrap_or_default(),
            users: dto
                .users
                .into_iter()
                .filter_map(UserDto::into_user_ref)
                .collect(),
            tasks: dto.tasks.into_iter().map(TaskDto::into_task).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProjectsResponse {
    Envelope { projects: Vec<ProjectDto> },
    Bare(Vec<ProjectDto>),
}

impl ProjectsResponse {
    pub fn into_projects(self) -> Vec<Project> {
        match self {
            ProjectsResponse::Envelope { projects } | ProjectsResponse::Bare(projects) => {
                projects.into_iter().map(Project::from).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn list_entry_with_camel_case_fields_maps_to_task() {
        let dto: TaskDto = serde_json::from_value(json!({
            "id": 3,
            "project_id": 1,
            "title": "Write docs",
            "description": "",
            "status": "inProgress",
            "createdDate": "2025-01-01T10:00:00",
            "modifiedDate": "2025-01-02T10:00:00",
            "assignedUser": {"id": 7, "username": "ana"},
            "createdBy": {"id": 2, "username": "bo"}
        }))
        .expect("list entry should parse");

        let task = dto.into_task();
        assert_eq!(task.id, 3);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(
            task.assigned_user,
            Some(UserRef {
                id: 7,
                username: Some("ana".to_string())
            })
        );
        assert_eq!(task.created_by.map(|user| user.id), Some(2));
        assert_eq!(task.created_date, "2025-01-01T10:00:00");
        assert_eq!(task.modified_date, "2025-01-02T10:00:00");
    }

    #[test]
    fn snake_case_foreign_keys_map_to_user_refs() {
        let dto: TaskDto = serde_json::from_value(json!({
            "id": 4,
            "project_id": 1,
            "status": "bogus",
            "assigned_user_id": 5,
            "created_by": 6,
            "created_date": "a",
            "modified_date": "b"
        }))
        .expect("snake case entry should parse");

        let task = dto.into_task();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.assigned_user, Some(UserRef::new(5)));
        assert_eq!(task.created_by, Some(UserRef::new(6)));
    }

    #[test]
    fn null_assignee_stays_unassigned() {
        let dto: TaskDto = serde_json::from_value(json!({
            "id": 8,
            "assignedUser": null,
            "status": null
        }))
        .expect("nulls should parse");

        let task = dto.into_task();
        assert_eq!(task.assigned_user, None);
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn list_with_missing_creator_row_still_parses() {
        let dtos: Vec<TaskDto> = serde_json::from_str(
            r#"[
                {"id": 1, "project_id": 1, "status": "todo",
                 "createdBy": {"id": null, "username": null},
                 "assignedUser": {"id": null, "username": null}},
                {"id": 2, "project_id": 1, "status": "done",
                 "createdBy": {"id": 4, "username": "di"}}
            ]"#,
        )
        .expect("list with a null creator should parse");

        let tasks = dtos.into_iter().map(TaskDto::into_task).collect::<Vec<_>>();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].created_by, None);
        assert_eq!(tasks[0].assigned_user, None);
        assert_eq!(tasks[1].created_by.as_ref().map(|user| user.id), Some(4));
    }

    #[test]
    fn create_envelope_is_unwrapped() {
        let response: TaskResponse = serde_json::from_value(json!({
            "message": "Task created successfully",
            "task": {"title": "t", "status": "done", "project_id": 1}
        }))
        .expect("envelope should parse");

        let patch = response.into_patch();
        assert_eq!(patch.persisted_id(), None);
        assert_eq!(patch.status, Some(TaskStatus::Done));
    }

    #[test]
    fn bare_update_response_is_partial() {
        let response: TaskResponse = serde_json::from_value(json!({
            "id": 9,
            "title": "renamed",
            "status": "done",
            "modifiedDate": "2025-02-01T00:00:00"
        }))
        .expect("bare response should parse");

        let patch = response.into_patch();
        assert_eq!(patch.persisted_id(), Some(9));
        assert_eq!(patch.description, None);
        assert_eq!(patch.modified_date.as_deref(), Some("2025-02-01T00:00:00"));
    }

    #[test]
    fn create_payload_omits_id_and_uses_snake_case() {
        let task = Task {
            id: 0,
            project_id: 2,
            title: "New".to_string(),
            status: TaskStatus::InProgress,
            assigned_user: Some(UserRef::new(11)),
            created_by: Some(UserRef::new(3)),
            ..Task::default()
        };

        let body = serde_json::to_value(TaskPayload::for_create(&task, "NOW"))
            .expect("payload serializes");

        assert!(body.get("id").is_none());
        assert_eq!(body["status"], "inProgress");
        assert_eq!(body["assigned_user_id"], 11);
        assert_eq!(body["user_id"], 11);
        assert_eq!(body["created_by"], 3);
        assert_eq!(body["project_id"], 2);
        assert_eq!(body["created_date"], "NOW");
    }

    #[test]
    fn update_payload_carries_id_and_fresh_modified_date() {
        let task = Task {
            id: 5,
            created_date: "2024-12-01".to_string(),
            modified_date: "2024-12-02".to_string(),
            created_by: Some(UserRef::new(3)),
            ..Task::default()
        };

        let payload = TaskPayload::for_update(&task, "NOW");
        assert_eq!(payload.id, Some(5));
        assert_eq!(payload.created_date, "2024-12-01");
        assert_eq!(payload.modified_date, "NOW");
        assert_eq!(payload.user_id, Some(3));
    }

    #[test]
    fn projects_envelope_maps_members_and_tasks() {
        let response: ProjectsResponse = serde_json::from_value(json!({
            "projects": [{
                "id": 1,
                "name": "alpha",
                "description": "first",
                "users": [{"id": 1, "username": "ana"}],
                "tasks": [{"id": 10, "project_id": 1, "status": "done", "assigned_user_id": 1}]
            }]
        }))
        .expect("projects should parse");

        let projects = response.into_projects();
        assert_eq!(projects.len(), 1);
        assert!(projects[0].has_member(1));
        assert_eq!(projects[0].tasks[0].status, TaskStatus::Done);
    }
}
