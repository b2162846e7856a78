use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::{Project, Task, TaskPatch};

use super::dto::{ProjectsResponse, TaskDto, TaskPayload, TaskResponse};
use super::{
    ProjectStore, STORE_CONNECT_FAILED, STORE_CONTRACT_PARSE_ERROR, STORE_HTTP_ERROR,
    STORE_NOT_FOUND, STORE_REQUEST_FAILED, STORE_TIMEOUT, StoreError, StoreResult, TaskStore,
    require_persisted_id,
};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpTaskStore {
    client: Client,
    config: HttpStoreConfig,
}

impl HttpTaskStore {
    pub fn new(config: HttpStoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| {
                StoreError::new(
                    STORE_REQUEST_FAILED,
                    format!("failed to build HTTP client: {err}"),
                )
            })?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    async fn send(&self, request: RequestBuilder, route: &str) -> StoreResult<String> {
        let response = request
            .send()
            .await
            .map_err(|err| map_transport_error(route, err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| map_transport_error(route, err))?;

        debug!(route, status = status.as_u16(), bytes = body.len(), "backend responded");

        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::new(
                STORE_NOT_FOUND,
                format!("backend returned HTTP 404 for {route}"),
            ));
        }
        if !status.is_success() {
            return Err(StoreError::new(
                STORE_HTTP_ERROR,
                format!(
                    "backend returned HTTP {} for {route}: {}",
                    status.as_u16(),
                    error_detail(&body)
                ),
            ));
        }

        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        route: &str,
    ) -> StoreResult<T> {
        let body = self.send(request, route).await?;
        parse_body(&body, route)
    }
}

impl TaskStore for HttpTaskStore {
    async fn list_tasks(&self, project_id: i64) -> StoreResult<Vec<Task>> {
        require_persisted_id("project", project_id)?;

        let request = self
            .client
            .get(self.url("/tasks"))
            .query(&[("project_id", project_id)]);
        let tasks: Vec<TaskDto> = self.send_json(request, "GET /tasks").await?;

        Ok(tasks.into_iter().map(TaskDto::into_task).collect())
    }

    async fn create_task(&self, task: &Task) -> StoreResult<TaskPatch> {
        let now = Utc::now().to_rfc3339();
        let payload = TaskPayload::for_create(task, &now);

        let request = self.client.post(self.url("/tasks/")).json(&payload);
        let body = self.send(request, "POST /tasks/").await?;

        parse_task_response(&body, "POST /tasks/")
    }

    async fn update_task(&self, task: &Task) -> StoreResult<TaskPatch> {
        require_persisted_id("task", task.id)?;

        let now = Utc::now().to_rfc3339();
        let payload = TaskPayload::for_update(task, &now);
        let route = format!("PUT /tasks/{}", task.id);

        let request = self
            .client
            .put(self.url(&format!("/tasks/{}", task.id)))
            .json(&payload);
        let body = self.send(request, &route).await?;

        parse_task_response(&body, &route)
    }

    async fn delete_task(&self, task_id: i64) -> StoreResult<()> {
        require_persisted_id("task", task_id)?;

        let route = format!("DELETE /tasks/{task_id}");
        let request = self.client.delete(self.url(&format!("/tasks/{task_id}")));
        self.send(request, &route).await?;
        Ok(())
    }
}

impl ProjectStore for HttpTaskStore {
    async fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let request = self.client.get(self.url("/projects/"));
        let response: ProjectsResponse = self.send_json(request, "GET /projects/").await?;
        Ok(response.into_projects())
    }

    async fn add_member(&self, project_id: i64, user_id: i64) -> StoreResult<()> {
        require_persisted_id("project", project_id)?;
        require_persisted_id("user", user_id)?;

        let path = format!("/projects/{project_id}/users/{user_id}");
        let route = format!("POST {path}");
        self.send(self.client.post(self.url(&path)), &route).await?;
        Ok(())
    }

    async fn remove_member(&self, project_id: i64, user_id: i64) -> StoreResult<()> {
        require_persisted_id("project", project_id)?;
        require_persisted_id("user", user_id)?;

        let path = format!("/projects/{project_id}/users/{user_id}");
        let route = format!("DELETE {path}");
        self.send(self.client.delete(self.url(&path)), &route).await?;
        Ok(())
    }
}

fn parse_task_response(body: &str, route: &str) -> StoreResult<TaskPatch> {
    if body.trim().is_empty() {
        return Ok(TaskPatch::default());
    }
    let response: TaskResponse = parse_body(body, route)?;
    Ok(response.into_patch())
}

fn parse_body<T: DeserializeOwned>(body: &str, route: &str) -> StoreResult<T> {
    serde_json::from_str(body).map_err(|err| {
        StoreError::new(
            STORE_CONTRACT_PARSE_ERROR,
            format!("failed to parse {route} response JSON: {err}"),
        )
    })
}

fn map_transport_error(route: &str, err: reqwest::Error) -> StoreError {
    let code = if err.is_timeout() {
        STORE_TIMEOUT
    } else if err.is_connect() {
        STORE_CONNECT_FAILED
    } else {
        STORE_REQUEST_FAILED
    };
    StoreError::new(code, format!("{route} failed: {err}"))
}

/// FastAPI reports failures as `{"detail": "..."}`.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .and_then(|detail| detail.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::STORE_VALIDATION_ERROR;

    #[test]
    fn base_url_trims_trailing_slash() {
        let store = HttpTaskStore::new(HttpStoreConfig {
            base_url: "http://example.test:8000/".to_string(),
            ..HttpStoreConfig::default()
        })
        .expect("client should build");

        assert_eq!(store.base_url(), "http://example.test:8000");
        assert_eq!(store.url("/tasks/7"), "http://example.test:8000/tasks/7");
    }

    #[test]
    fn error_detail_prefers_fastapi_detail() {
        assert_eq!(
            error_detail(r#"{"detail":"User is already assigned to this project"}"#),
            "User is already assigned to this project"
        );
        assert_eq!(error_detail("  plain failure "), "plain failure");
    }

    #[test]
    fn empty_update_body_yields_empty_patch() {
        let patch = parse_task_response("", "PUT /tasks/1").expect("empty body is accepted");
        assert_eq!(patch, TaskPatch::default());
    }

    #[test]
    fn malformed_body_is_contract_error() {
        let err = parse_task_response("[1,2", "PUT /tasks/1").expect_err("should fail");
        assert_eq!(err.code, STORE_CONTRACT_PARSE_ERROR);
    }

    #[tokio::test]
    async fn validation_happens_before_any_request() {
        let store = HttpTaskStore::new(HttpStoreConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..HttpStoreConfig::default()
        })
        .expect("client should build");

        let err = store
            .delete_task(0)
            .await
            .expect_err("sentinel id must be rejected");
        assert_eq!(err.code, STORE_VALIDATION_ERROR);

        let err = store
            .list_tasks(0)
            .await
            .expect_err("missing project id must be rejected");
        assert_eq!(err.code, STORE_VALIDATION_ERROR);
    }
}
