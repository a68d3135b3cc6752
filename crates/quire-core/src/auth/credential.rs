use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::config::ConfigError;

/// Subtracted from the provider-declared lifetime so a token never expires mid-request.
pub const SAFETY_MARGIN_SECS: i64 = 300;

/// Lifetime assumed when the token endpoint omits `expires_in` (30 days).
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 2_592_000;

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// OAuth client identity. Immutable once constructed.
#[derive(Clone)]
pub struct ClientIdentity {
    client_id: String,
    client_secret: String,
}

impl ClientIdentity {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Mutable token half of a credential.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenState {
    /// True when the cached access token cannot be handed out as of `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.access_token, self.expires_at) {
            (Some(_), Some(expires_at)) => now >= expires_at,
            _ => true,
        }
    }

    /// Install a token response received at `received_at`.
    ///
    /// A refresh token in the response replaces the stored one; without one the
    /// previous refresh token is kept. An unusable `expires_in` leaves the state
    /// untouched.
    pub(crate) fn apply(
        &mut self,
        response: &TokenResponse,
        received_at: DateTime<Utc>,
        safety_margin: Duration,
    ) -> Result<(), AuthError> {
        let expires_at = response
            .expires_at(received_at, safety_margin)
            .ok_or_else(|| AuthError::InvalidExpiry(response.expires_in_or_default()))?;
        self.access_token = Some(response.access_token.clone());
        self.expires_at = Some(expires_at);
        if let Some(refresh_token) = &response.refresh_token {
            self.refresh_token = Some(refresh_token.clone());
        }
        Ok(())
    }
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// OAuth2 client identity plus its current token state.
#[derive(Debug, Clone)]
pub struct Credential {
    identity: ClientIdentity,
    tokens: TokenState,
}

impl Credential {
    /// Both identity values are required; empty strings count as missing.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.trim().is_empty() {
            return Err(ConfigError::MissingClientId);
        }
        if client_secret.trim().is_empty() {
            return Err(ConfigError::MissingClientSecret);
        }
        Ok(Self {
            identity: ClientIdentity {
                client_id,
                client_secret,
            },
            tokens: TokenState::default(),
        })
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.tokens.refresh_token = Some(refresh_token.into());
        self
    }

    /// Seed an access token obtained elsewhere (e.g. a previous process).
    pub fn with_access_token(
        mut self,
        access_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        self.tokens.access_token = Some(access_token.into());
        self.tokens.expires_at = Some(expires_at);
        self
    }

    pub fn client_id(&self) -> &str {
        self.identity.client_id()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.refresh_token.as_deref()
    }

    pub fn into_parts(self) -> (ClientIdentity, TokenState) {
        (self.identity, self.tokens)
    }
}

/// Reply from the token endpoint for both grant types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn expires_in_or_default(&self) -> i64 {
        self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)
    }

    /// `received_at + expires_in - safety_margin`, or `None` when `expires_in` is
    /// negative or the result does not fit in a timestamp.
    pub fn expires_at(
        &self,
        received_at: DateTime<Utc>,
        safety_margin: Duration,
    ) -> Option<DateTime<Utc>> {
        let expires_in = self.expires_in_or_default();
        if expires_in < 0 {
            return None;
        }
        received_at
            .checked_add_signed(Duration::try_seconds(expires_in)?)?
            .checked_sub_signed(safety_margin)
    }
}
