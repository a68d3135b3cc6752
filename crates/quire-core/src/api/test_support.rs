use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;

use super::QuireClient;
use crate::auth::{Credential, CredentialManager, OAuthEndpoints};

/// Client against `server` whose token endpoint always hands out `T1`.
pub(crate) fn client_for(server: &MockServer) -> QuireClient {
    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200).json_body_obj(&json!({
            "access_token": "T1",
            "token_type": "bearer",
            "expires_in": 3600
        }));
    });
    let endpoints = OAuthEndpoints::new(
        "http://localhost/oauth",
        &format!("{}{}", server.base_url(), "/oauth/token"),
    )
    .unwrap();
    let credential = Credential::new("a", "b").unwrap().with_refresh_token("R0");
    let manager = CredentialManager::with_endpoints(credential, endpoints).unwrap();
    QuireClient::with_base_url(Arc::new(manager), &format!("{}/api/", server.base_url())).unwrap()
}
