//! REST client for the task service.
//!
//! Thin wrapper over `reqwest` covering the five operations the core
//! consumes: list (with filter), create, update, delete, and reorder.
//! Every call carries the session's bearer token. Failures surface as
//! [`ApiError`] and are never fatal; callers abandon or revert the
//! operation and keep the prior collection.

use std::time::Duration;

use taskdeck_proto::filter::FilterCriteria;
use taskdeck_proto::task::{ReorderItem, ReorderRequest, Task, TaskDraft, TaskId, TaskPatch};

/// Default timeout applied to every request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the REST boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network-level failure (DNS, connect, timeout, body decode).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server returned {status} for {operation}")]
    Status {
        status: reqwest::StatusCode,
        operation: &'static str,
    },
}

/// Client for the task REST surface.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Creates a client for `base_url` (e.g. `http://127.0.0.1:8000`)
    /// authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Fetches the task list, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or non-success status.
    pub async fn list(&self, criteria: &FilterCriteria) -> Result<Vec<Task>, ApiError> {
        let response = self
            .http
            .get(self.url("/tasks"))
            .query(&criteria.to_query_pairs())
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = check_status(response, "list tasks")?;
        Ok(response.json().await?)
    }

    /// Creates a task and returns the server's record (with assigned
    /// id and position).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or non-success status.
    pub async fn create(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        let response = self
            .http
            .post(self.url("/tasks"))
            .bearer_auth(&self.token)
            .json(draft)
            .send()
            .await?;
        let response = check_status(response, "create task")?;
        Ok(response.json().await?)
    }

    /// Applies a partial update and returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or non-success status.
    pub async fn update(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, ApiError> {
        let response = self
            .http
            .put(self.url(&format!("/tasks/{id}")))
            .bearer_auth(&self.token)
            .json(patch)
            .send()
            .await?;
        let response = check_status(response, "update task")?;
        Ok(response.json().await?)
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or non-success status.
    pub async fn delete(&self, id: TaskId) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.url(&format!("/tasks/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        check_status(response, "delete task")?;
        Ok(())
    }

    /// Persists new positions for every task in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or non-success status.
    pub async fn reorder(&self, items: Vec<ReorderItem>) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("/tasks/reorder"))
            .bearer_auth(&self.token)
            .json(&ReorderRequest { items })
            .send()
            .await?;
        check_status(response, "reorder tasks")?;
        Ok(())
    }
}

fn check_status(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        tracing::warn!(%status, operation, "request failed");
        Err(ApiError::Status { status, operation })
    }
}
