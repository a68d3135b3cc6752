use std::time::Duration as StdDuration;

use reqwest::Client;
use url::Url;

use super::{AuthError, ClientIdentity, TokenResponse};

pub const DEFAULT_AUTHORIZATION_URL: &str = "https://quire.io/oauth";
pub const DEFAULT_TOKEN_URL: &str = "https://quire.io/oauth/token";
pub const DEFAULT_REDIRECT_URI: &str = "https://localhost";

const DEFAULT_USER_AGENT: &str = "quire-rs/0.1.0";
const TOKEN_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// OAuth endpoints used by the authorization code flow.
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorization_url: Url,
    pub token_url: Url,
}

impl OAuthEndpoints {
    pub fn new(authorization_url: &str, token_url: &str) -> Result<Self, AuthError> {
        Ok(Self {
            authorization_url: Url::parse(authorization_url)?,
            token_url: Url::parse(token_url)?,
        })
    }
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self {
            authorization_url: Url::parse(DEFAULT_AUTHORIZATION_URL).unwrap(),
            token_url: Url::parse(DEFAULT_TOKEN_URL).unwrap(),
        }
    }
}

/// Performs token endpoint calls for a fixed client identity.
///
/// Holds no token state; [`super::CredentialManager`] decides when to call it
/// and what to do with the result.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: Client,
    identity: ClientIdentity,
    endpoints: OAuthEndpoints,
}

impl OAuthClient {
    pub fn new(identity: ClientIdentity) -> Result<Self, AuthError> {
        Self::with_endpoints(identity, OAuthEndpoints::default())
    }

    pub fn with_endpoints(
        identity: ClientIdentity,
        endpoints: OAuthEndpoints,
    ) -> Result<Self, AuthError> {
        let http = Client::builder().user_agent(DEFAULT_USER_AGENT).build()?;
        Ok(Self {
            http,
            identity,
            endpoints,
        })
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn endpoints(&self) -> &OAuthEndpoints {
        &self.endpoints
    }

    /// URL the user opens to grant access. `redirect_uri` is passed through as-is.
    pub fn authorization_url(&self, redirect_uri: &str) -> Url {
        let mut url = self.endpoints.authorization_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", self.identity.client_id())
            .append_pair("redirect_uri", redirect_uri);
        url
    }

    /// Exchange an authorization code for access/refresh tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        self.token_request(&[("grant_type", "authorization_code"), ("code", code)])
            .await
    }

    /// Trade a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, grant: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let mut form: Vec<(&str, &str)> = grant.to_vec();
        form.push(("client_id", self.identity.client_id()));
        form.push(("client_secret", self.identity.client_secret()));

        let response = self
            .http
            .post(self.endpoints.token_url.clone())
            .form(&form)
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint { status, body });
        }

        let raw = response.bytes().await?;
        serde_json::from_slice(&raw).map_err(AuthError::MalformedTokenResponse)
    }
}
