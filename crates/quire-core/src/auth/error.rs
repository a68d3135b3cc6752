use reqwest::header::InvalidHeaderValue;
use reqwest::StatusCode;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by authentication and credential management routines.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint error {status}: {body}")]
    TokenEndpoint { status: StatusCode, body: String },
    #[error("malformed token response: {0}")]
    MalformedTokenResponse(#[source] serde_json::Error),
    #[error("token response carries an unusable expires_in ({0}s)")]
    InvalidExpiry(i64),
    #[error("access token is not a valid header value")]
    InvalidAccessToken(#[from] InvalidHeaderValue),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("authorization request denied ({0})")]
    AccessDenied(String),
    #[error("authorization response missing code parameter")]
    MissingAuthorizationCode,
    #[error("invalid authorization response: {0}")]
    InvalidAuthorizationResponse(String),
}

impl AuthError {
    /// True for failures caused by missing or unusable configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AuthError::Config(_))
    }

    /// True when the provider rejected the code or refresh token.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            AuthError::TokenEndpoint { .. }
                | AuthError::MalformedTokenResponse(_)
                | AuthError::InvalidExpiry(_)
        )
    }
}
