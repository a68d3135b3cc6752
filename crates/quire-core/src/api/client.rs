use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::auth::{AuthError, CredentialManager};
use crate::config::DEFAULT_API_BASE;

const USER_AGENT: &str = "quire-rs/0.1.0";

/// Errors returned by the REST dispatcher.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP status {status} body: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

impl ApiError {
    /// HTTP status for non-success responses.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Authenticated JSON dispatcher for the Quire REST API.
///
/// Every call asks the [`CredentialManager`] for a header right before sending,
/// so a token that lapses between two calls is refreshed before the second.
#[derive(Clone)]
pub struct QuireClient {
    http: Client,
    base: String,
    credentials: Arc<CredentialManager>,
}

impl QuireClient {
    /// Build a client targeting the default Quire API base.
    pub fn new(credentials: Arc<CredentialManager>) -> ApiResult<Self> {
        Self::with_base_url(credentials, DEFAULT_API_BASE)
    }

    /// Build a client with a custom API base (useful for testing).
    pub fn with_base_url(credentials: Arc<CredentialManager>, base: &str) -> ApiResult<Self> {
        Url::parse(base)?;
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_owned(),
            credentials,
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    /// Absolute URL for a path relative to the API base.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Issue one authenticated call and return the decoded JSON body.
    ///
    /// Empty success bodies decode to `Value::Null`.
    pub async fn request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> ApiResult<Value>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint_url(path);
        let (auth_name, auth_value) = self.credentials.authorization_header().await?;
        debug!(%method, %url, "dispatching API request");

        let mut request = self
            .http
            .request(method, &url)
            .header(auth_name, auth_value)
            .header(CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!(%status, %url, "API request failed");
            return Err(ApiError::Status { status, body: text });
        }

        let raw = response.bytes().await?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&raw)?)
    }

    /// [`request`](Self::request) followed by decoding into `R`.
    pub async fn request_as<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> ApiResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let value = self.request(method, path, body, query).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> ApiResult<R> {
        self.request_as::<Value, R>(Method::GET, path, None, &[]).await
    }
}
