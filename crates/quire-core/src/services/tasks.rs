use reqwest::Method;
use serde_json::Value;

use crate::api::{
    ApiResult, QuireClient, Task, TaskCreateInput, TaskUpdateInput, TASK_STATUS_DONE,
};

/// Provides higher-level helpers around Quire tasks.
#[derive(Clone)]
pub struct TaskService {
    client: QuireClient,
}

impl TaskService {
    pub fn new(client: QuireClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, project_oid: &str, options: TaskQueryOptions) -> ApiResult<Vec<Task>> {
        let query = options.into_query();
        self.client
            .request_as::<Value, _>(
                Method::GET,
                &format!("/project/id/{project_oid}/task/list"),
                None,
                &query,
            )
            .await
    }

    pub async fn get(&self, task_oid: &str) -> ApiResult<Task> {
        self.client.get(&format!("/task/id/{task_oid}")).await
    }

    pub async fn create(&self, project_oid: &str, input: &TaskCreateInput) -> ApiResult<Task> {
        self.client
            .request_as::<_, Task>(
                Method::POST,
                &format!("/project/id/{project_oid}/task"),
                Some(input),
                &[],
            )
            .await
    }

    pub async fn update(&self, task_oid: &str, input: &TaskUpdateInput) -> ApiResult<Task> {
        self.client
            .request_as::<_, Task>(
                Method::PUT,
                &format!("/task/id/{task_oid}"),
                Some(input),
                &[],
            )
            .await
    }

    /// Move a task to the "Done" status.
    pub async fn complete(&self, task_oid: &str) -> ApiResult<Task> {
        let input = TaskUpdateInput {
            status: Some(TASK_STATUS_DONE),
            ..TaskUpdateInput::default()
        };
        self.update(task_oid, &input).await
    }

    pub async fn delete(&self, task_oid: &str) -> ApiResult<()> {
        self.client
            .request::<Value>(Method::DELETE, &format!("/task/id/{task_oid}"), None, &[])
            .await?;
        Ok(())
    }
}

/// Filters applied when listing a project's tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskQueryOptions {
    pub status: Option<i64>,
    pub assignee: Option<String>,
}

impl TaskQueryOptions {
    fn into_query(self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status", status.to_string()));
        }
        if let Some(assignee) = self.assignee.filter(|value| !value.is_empty()) {
            query.push(("assignee", assignee));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::client_for;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn converts_options_to_query() {
        let options = TaskQueryOptions {
            status: Some(0),
            assignee: Some("u-1".into()),
        };
        assert_eq!(
            options.into_query(),
            vec![("status", "0".to_string()), ("assignee", "u-1".to_string())]
        );
        assert!(TaskQueryOptions::default().into_query().is_empty());
    }

    #[tokio::test]
    async fn list_applies_filters() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/project/id/p-1/task/list")
                .query_param("status", "10");
            then.status(200).json_body_obj(&json!([
                { "oid": "t-1", "name": "Ship it", "status": 10,
                  "assignees": [{ "oid": "u-1", "name": "Ada" }] }
            ]));
        });

        let options = TaskQueryOptions {
            status: Some(10),
            ..TaskQueryOptions::default()
        };
        let tasks = TaskService::new(client_for(&server))
            .list("p-1", options)
            .await
            .unwrap();
        mock.assert();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].is_completed());
        assert_eq!(tasks[0].assignees[0].name, "Ada");
    }

    #[tokio::test]
    async fn create_posts_partial_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/project/id/p-1/task")
                .json_body_obj(&json!({ "name": "Write docs", "due": "2024-07-01" }));
            then.status(200)
                .json_body_obj(&json!({ "oid": "t-9", "name": "Write docs", "due": "2024-07-01" }));
        });

        let mut input = TaskCreateInput::new("Write docs");
        input.due = Some("2024-07-01".into());
        let task = TaskService::new(client_for(&server))
            .create("p-1", &input)
            .await
            .unwrap();
        mock.assert();
        assert_eq!(task.oid, "t-9");
        assert!(!task.is_completed());
    }

    #[tokio::test]
    async fn complete_sets_done_status() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/task/id/t-1")
                .json_body_obj(&json!({ "status": TASK_STATUS_DONE }));
            then.status(200)
                .json_body_obj(&json!({ "oid": "t-1", "status": TASK_STATUS_DONE }));
        });

        let task = TaskService::new(client_for(&server))
            .complete("t-1")
            .await
            .unwrap();
        mock.assert();
        assert!(task.is_completed());
    }

    #[tokio::test]
    async fn delete_accepts_empty_reply() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/api/task/id/t-1");
            then.status(200);
        });

        TaskService::new(client_for(&server))
            .delete("t-1")
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn update_failure_propagates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/api/task/id/t-1");
            then.status(400).body("bad status");
        });

        let input = TaskUpdateInput {
            status: Some(999),
            ..TaskUpdateInput::default()
        };
        let err = TaskService::new(client_for(&server))
            .update("t-1", &input)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::BAD_REQUEST));
    }
}
