use serde::Serialize;
use tracing::{error, info};

use crate::store::{ProjectStore, StoreResult};
use crate::types::{Project, Task, TaskStatus, UserRef};

/// Narrows `ProjectDirectory::assigned_tasks`. Empty lists mean no filter.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct TaskFilter {
    pub projects: Vec<String>,
    pub statuses: Vec<TaskStatus>,
}

impl TaskFilter {
    fn accepts(&self, project_name: &str, status: TaskStatus) -> bool {
        (self.projects.is_empty() || self.projects.iter().any(|name| name == project_name))
            && (self.statuses.is_empty() || self.statuses.contains(&status))
    }
}

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct AssignedTask {
    pub project_name: String,
    #[serde(flatten)]
    pub task: Task,
}

/// The projects one user can see, split by membership.
pub struct ProjectDirectory<S> {
    store: S,
    user_id: i64,
    member: Vec<Project>,
    other: Vec<Project>,
}

impl<S: ProjectStore> ProjectDirectory<S> {
    pub fn new(store: S, user_id: i64) -> Self {
        Self {
            store,
            user_id,
            member: Vec::new(),
            other: Vec::new(),
        }
    }

    pub async fn load(store: S, user_id: i64) -> StoreResult<Self> {
        let mut directory = Self::new(store, user_id);
        directory.reload().await?;
        Ok(directory)
    }

    pub async fn reload(&mut self) -> StoreResult<()> {
        let projects = self.store.list_projects().await.inspect_err(|err| {
            error!(user_id = self.user_id, error = %err, "failed to load projects");
        })?;

        let (member, other): (Vec<_>, Vec<_>) = projects
            .into_iter()
            .partition(|project| project.has_member(self.user_id));
        self.member = member;
        self.other = other;
        Ok(())
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn member_projects(&self) -> &[Project] {
        &self.member
    }

    pub fn other_projects(&self) -> &[Project] {
        &self.other
    }

    pub fn find(&self, project_id: i64) -> Option<&Project> {
        self.member
            .iter()
            .chain(self.other.iter())
            .find(|project| project.id == project_id)
    }

    pub async fn join(&mut self, project_id: i64) -> StoreResult<()> {
        self.store
            .add_member(project_id, self.user_id)
            .await
            .inspect_err(|err| {
                error!(project_id, user_id = self.user_id, error = %err, "failed to join project");
            })?;

        if let Some(index) = self.other.iter().position(|project| project.id == project_id) {
            let mut project = self.other.remove(index);
            if !project.has_member(self.user_id) {
                project.users.push(UserRef::new(self.user_id));
            }
            self.member.push(project);
        }
        info!(project_id, user_id = self.user_id, "joined project");
        Ok(())
    }

    pub async fn leave(&mut self, project_id: i64) -> StoreResult<()> {
        self.store
            .remove_member(project_id, self.user_id)
            .await
            .inspect_err(|err| {
                error!(project_id, user_id = self.user_id, error = %err, "failed to leave project");
            })?;

        if let Some(index) = self.member.iter().position(|project| project.id == project_id) {
            let mut project = self.member.remove(index);
            project.users.retain(|user| user.id != self.user_id);
            self.other.push(project);
        }
        info!(project_id, user_id = self.user_id, "left project");
        Ok(())
    }

    /// Everyone sharing a project with the user, first occurrence wins.
    pub fn colleagues(&self) -> Vec<UserRef> {
        let mut seen: Vec<UserRef> = Vec::new();
        for user in self.member.iter().flat_map(|project| project.users.iter()) {
            if user.id == self.user_id {
                continue;
            }
            if !seen.iter().any(|known| known.id == user.id) {
                seen.push(user.clone());
            }
        }
        seen
    }

    pub fn assigned_tasks(&self, filter: &TaskFilter) -> Vec<AssignedTask> {
        self.member
            .iter()
            .flat_map(|project| {
                project
                    .tasks
                    .iter()
                    .filter(|task| {
                        task.assigned_user
                            .as_ref()
                            .is_some_and(|user| user.id == self.user_id)
                    })
                    .filter(|task| filter.accepts(&project.name, task.status))
                    .map(|task| AssignedTask {
                        project_name: project.name.clone(),
                        task: task.clone(),
                    })
            })
            .collect()
    }
}
