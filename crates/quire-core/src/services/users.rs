use crate::api::{ApiResult, QuireClient, User};

#[derive(Clone)]
pub struct UserService {
    client: QuireClient,
}

impl UserService {
    pub fn new(client: QuireClient) -> Self {
        Self { client }
    }

    /// The user the current access token belongs to.
    pub async fn me(&self) -> ApiResult<User> {
        self.client.get("/user/id/me").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::client_for;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn me_decodes_user() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/user/id/me")
                .header("authorization", "Bearer T1");
            then.status(200).json_body_obj(&serde_json::json!({
                "id": "ada",
                "oid": "u-1",
                "name": "Ada Lovelace",
                "email": "ada@example.com"
            }));
        });

        let user = UserService::new(client_for(&server)).me().await.unwrap();
        mock.assert();
        assert_eq!(user.oid, "u-1");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert!(user.website.is_none());
    }
}
