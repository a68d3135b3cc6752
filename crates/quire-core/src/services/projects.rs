use reqwest::Method;

use crate::api::{ApiResult, Project, ProjectUpdateInput, QuireClient};

#[derive(Clone)]
pub struct ProjectService {
    client: QuireClient,
}

impl ProjectService {
    pub fn new(client: QuireClient) -> Self {
        Self { client }
    }

    /// All projects visible to the current user.
    pub async fn list(&self) -> ApiResult<Vec<Project>> {
        self.client.get("/project/list").await
    }

    pub async fn get(&self, project_oid: &str) -> ApiResult<Project> {
        self.client.get(&format!("/project/id/{project_oid}")).await
    }

    pub async fn update(
        &self,
        project_oid: &str,
        input: &ProjectUpdateInput,
    ) -> ApiResult<Project> {
        self.client
            .request_as::<_, Project>(
                Method::PUT,
                &format!("/project/id/{project_oid}"),
                Some(input),
                &[],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::client_for;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn list_decodes_projects() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/project/list");
            then.status(200).json_body_obj(&json!([
                { "id": "inbox", "oid": "p-1", "name": "Inbox" },
                { "id": "ops", "oid": "p-2", "name": "Ops", "archived": true, "color": "35" }
            ]));
        });

        let projects = ProjectService::new(client_for(&server)).list().await.unwrap();
        mock.assert();
        assert_eq!(projects.len(), 2);
        assert!(!projects[0].archived);
        assert!(projects[1].archived);
        assert_eq!(projects[1].color.as_deref(), Some("35"));
    }

    #[tokio::test]
    async fn update_sends_only_supplied_fields() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/project/id/p-1")
                .json_body_obj(&json!({ "name": "Renamed" }));
            then.status(200)
                .json_body_obj(&json!({ "oid": "p-1", "name": "Renamed" }));
        });

        let input = ProjectUpdateInput {
            name: Some("Renamed".into()),
            ..ProjectUpdateInput::default()
        };
        let project = ProjectService::new(client_for(&server))
            .update("p-1", &input)
            .await
            .unwrap();
        mock.assert();
        assert_eq!(project.name, "Renamed");
    }

    #[tokio::test]
    async fn get_not_found_is_api_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/project/id/missing");
            then.status(404).body("not found");
        });

        let err = ProjectService::new(client_for(&server))
            .get("missing")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::NOT_FOUND));
    }
}
