//! Task store client: the REST backend seen through two small traits.

pub mod dto;
pub mod http;

use std::fmt;
use std::future::Future;

use crate::types::{Project, Task, TaskPatch};

pub use http::{HttpStoreConfig, HttpTaskStore};

pub const STORE_VALIDATION_ERROR: &str = "STORE_VALIDATION_ERROR";
pub const STORE_CONNECT_FAILED: &str = "STORE_CONNECT_FAILED";
pub const STORE_TIMEOUT: &str = "STORE_TIMEOUT";
pub const STORE_REQUEST_FAILED: &str = "STORE_REQUEST_FAILED";
pub const STORE_HTTP_ERROR: &str = "STORE_HTTP_ERROR";
pub const STORE_NOT_FOUND: &str = "STORE_NOT_FOUND";
pub const STORE_CONTRACT_PARSE_ERROR: &str = "STORE_CONTRACT_PARSE_ERROR";

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StoreError {
    pub code: String,
    pub message: String,
}

impl StoreError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(STORE_VALIDATION_ERROR, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == STORE_NOT_FOUND
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// The four task operations the board needs from the backend.
pub trait TaskStore: Send + Sync {
    fn list_tasks(&self, project_id: i64) -> impl Future<Output = StoreResult<Vec<Task>>> + Send;

    /// `task.id` is ignored; the server assigns one.
    fn create_task(&self, task: &Task) -> impl Future<Output = StoreResult<TaskPatch>> + Send;

    fn update_task(&self, task: &Task) -> impl Future<Output = StoreResult<TaskPatch>> + Send;

    fn delete_task(&self, task_id: i64) -> impl Future<Output = StoreResult<()>> + Send;
}

pub trait ProjectStore: Send + Sync {
    fn list_projects(&self) -> impl Future<Output = StoreResult<Vec<Project>>> + Send;

    fn add_member(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn remove_member(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}

pub(crate) fn require_persisted_id(kind: &str, id: i64) -> StoreResult<()> {
    if id <= 0 {
        return Err(StoreError::validation(format!(
            "{kind} id must be a positive integer, got {id}"
        )));
    }
    Ok(())
}
