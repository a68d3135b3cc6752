use reqwest::Method;
use serde_json::Value;

use crate::api::{ApiResult, Comment, CommentBody, QuireClient};

#[derive(Clone)]
pub struct CommentService {
    client: QuireClient,
}

impl CommentService {
    pub fn new(client: QuireClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, task_oid: &str) -> ApiResult<Vec<Comment>> {
        self.client
            .get(&format!("/task/id/{task_oid}/comment/list"))
            .await
    }

    pub async fn add(&self, task_oid: &str, content: &str) -> ApiResult<Comment> {
        self.client
            .request_as::<_, Comment>(
                Method::POST,
                &format!("/task/id/{task_oid}/comment"),
                Some(&CommentBody {
                    description: content,
                }),
                &[],
            )
            .await
    }

    pub async fn update(&self, comment_oid: &str, content: &str) -> ApiResult<Comment> {
        self.client
            .request_as::<_, Comment>(
                Method::PUT,
                &format!("/comment/id/{comment_oid}"),
                Some(&CommentBody {
                    description: content,
                }),
                &[],
            )
            .await
    }

    pub async fn delete(&self, comment_oid: &str) -> ApiResult<()> {
        self.client
            .request::<Value>(
                Method::DELETE,
                &format!("/comment/id/{comment_oid}"),
                None,
                &[],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::client_for;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn add_sends_description() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/task/id/t-1/comment")
                .json_body_obj(&json!({ "description": "Done in CI" }));
            then.status(200).json_body_obj(&json!({
                "oid": "c-1",
                "description": "Done in CI",
                "createdAt": "2024-07-01T12:00:00.000Z",
                "user": { "oid": "u-1", "name": "bot" }
            }));
        });

        let comment = CommentService::new(client_for(&server))
            .add("t-1", "Done in CI")
            .await
            .unwrap();
        mock.assert();
        assert_eq!(comment.content, "Done in CI");
        assert_eq!(comment.user.name, "bot");
    }

    #[tokio::test]
    async fn list_decodes_comments() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/task/id/t-1/comment/list");
            then.status(200).json_body_obj(&json!([
                { "oid": "c-1", "description": "first" },
                { "oid": "c-2", "description": "second", "user": null }
            ]));
        });

        let comments = CommentService::new(client_for(&server))
            .list("t-1")
            .await
            .unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].content, "second");
        assert_eq!(comments[1].user.oid, "");
    }

    #[tokio::test]
    async fn update_and_delete_target_comment() {
        let server = MockServer::start();
        let update = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/comment/id/c-1")
                .json_body_obj(&json!({ "description": "edited" }));
            then.status(200)
                .json_body_obj(&json!({ "oid": "c-1", "description": "edited" }));
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/api/comment/id/c-1");
            then.status(204);
        });

        let service = CommentService::new(client_for(&server));
        assert_eq!(service.update("c-1", "edited").await.unwrap().content, "edited");
        service.delete("c-1").await.unwrap();
        update.assert();
        delete.assert();
    }
}
