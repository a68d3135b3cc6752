use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    AuthError, Clock, Credential, CredentialStore, OAuthClient, OAuthEndpoints, StoredCredential,
    SystemClock, TokenResponse, TokenState, SAFETY_MARGIN_SECS,
};
use crate::config::ConfigError;

struct ProfileStore {
    store: Box<dyn CredentialStore + Send + Sync>,
    profile: String,
    seed_refresh_token: Option<String>,
}

/// Owns the credential and hands out access tokens that are valid for at least
/// the safety margin.
///
/// Token state sits behind a single async mutex that is held across the token
/// endpoint round trip, so at most one exchange or refresh is in flight and
/// concurrent callers of [`get_valid_token`](Self::get_valid_token) wait for it
/// instead of refreshing again.
pub struct CredentialManager {
    oauth: OAuthClient,
    tokens: Mutex<TokenState>,
    clock: Arc<dyn Clock>,
    safety_margin: Duration,
    store: Option<ProfileStore>,
}

impl CredentialManager {
    pub fn new(credential: Credential) -> Result<Self, AuthError> {
        Self::with_endpoints(credential, OAuthEndpoints::default())
    }

    pub fn with_endpoints(
        credential: Credential,
        endpoints: OAuthEndpoints,
    ) -> Result<Self, AuthError> {
        let (identity, tokens) = credential.into_parts();
        Ok(Self {
            oauth: OAuthClient::with_endpoints(identity, endpoints)?,
            tokens: Mutex::new(tokens),
            clock: Arc::new(SystemClock),
            safety_margin: Duration::seconds(SAFETY_MARGIN_SECS),
            store: None,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_safety_margin(mut self, margin: Duration) -> Self {
        self.safety_margin = margin;
        self
    }

    /// Persist token state under `profile` after every exchange or refresh.
    ///
    /// A stored record is adopted when no refresh token was configured, or when it
    /// was seeded from the configured token (it then carries that token's
    /// rotations). A configured token the record has never seen replaces it.
    pub fn with_store<S>(mut self, store: S, profile: impl Into<String>) -> Result<Self, AuthError>
    where
        S: CredentialStore + Send + Sync + 'static,
    {
        let profile = profile.into();
        let tokens = self.tokens.get_mut();
        let mut seed_refresh_token = tokens.refresh_token.clone();
        if let Some(saved) = store.load(&profile)? {
            if saved.continues(seed_refresh_token.as_deref()) {
                debug!(profile = %profile, "loaded stored token state");
                seed_refresh_token = saved.seed_refresh_token.or(seed_refresh_token);
                *tokens = saved.tokens;
            } else {
                info!(
                    profile = %profile,
                    "configured refresh token changed; ignoring stored state"
                );
            }
        }
        self.store = Some(ProfileStore {
            store: Box::new(store),
            profile,
            seed_refresh_token,
        });
        Ok(self)
    }

    pub fn client_id(&self) -> &str {
        self.oauth.identity().client_id()
    }

    /// Authorization endpoint URL carrying `client_id` and `redirect_uri`.
    pub fn build_authorization_url(&self, redirect_uri: &str) -> Url {
        self.oauth.authorization_url(redirect_uri)
    }

    /// Exchange an authorization code and install the resulting tokens.
    pub async fn exchange(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let mut tokens = self.tokens.lock().await;
        debug!("exchanging authorization code");
        let response = self.oauth.exchange_code(code).await?;
        self.install(&mut tokens, &response)?;
        info!("authorization code exchanged");
        Ok(response)
    }

    /// Refresh the access token using the stored refresh token.
    pub async fn refresh(&self) -> Result<TokenResponse, AuthError> {
        let mut tokens = self.tokens.lock().await;
        self.refresh_locked(&mut tokens).await
    }

    /// Cached access token, refreshed first when missing or past `expires_at`.
    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let mut tokens = self.tokens.lock().await;
        if !tokens.needs_refresh(self.clock.now()) {
            if let Some(token) = &tokens.access_token {
                return Ok(token.clone());
            }
        }
        debug!("access token missing or expired");
        let response = self.refresh_locked(&mut tokens).await?;
        Ok(response.access_token)
    }

    /// `Authorization: Bearer <token>`, with the value marked sensitive.
    pub async fn authorization_header(&self) -> Result<(HeaderName, HeaderValue), AuthError> {
        let token = self.get_valid_token().await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        value.set_sensitive(true);
        Ok((AUTHORIZATION, value))
    }

    /// Copy of the current token state.
    pub async fn snapshot(&self) -> TokenState {
        self.tokens.lock().await.clone()
    }

    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.tokens.lock().await.expires_at
    }

    /// Drop all token state and remove any stored copy.
    pub async fn forget(&self) -> Result<(), AuthError> {
        let mut tokens = self.tokens.lock().await;
        *tokens = TokenState::default();
        if let Some(store) = &self.store {
            store.store.delete(&store.profile)?;
        }
        Ok(())
    }

    async fn refresh_locked(&self, tokens: &mut TokenState) -> Result<TokenResponse, AuthError> {
        let refresh_token = tokens
            .refresh_token
            .clone()
            .ok_or(ConfigError::MissingRefreshToken)?;
        debug!("refreshing access token");
        let response = self.oauth.refresh(&refresh_token).await?;
        self.install(tokens, &response)?;
        Ok(response)
    }

    /// Apply a token response, then persist it. The in-memory state is
    /// authoritative: a failed save is logged and the new token is still served.
    fn install(&self, tokens: &mut TokenState, response: &TokenResponse) -> Result<(), AuthError> {
        if response.expires_in.is_none() {
            warn!(
                default_secs = response.expires_in_or_default(),
                "token response omitted expires_in; assuming default lifetime"
            );
        }
        let rotated = response.refresh_token.is_some()
            && response.refresh_token != tokens.refresh_token;
        tokens.apply(response, self.clock.now(), self.safety_margin)?;
        if rotated {
            debug!("refresh token rotated");
        }
        debug!(expires_at = ?tokens.expires_at, "access token installed");

        if let Some(store) = &self.store {
            let record = StoredCredential {
                seed_refresh_token: store.seed_refresh_token.clone(),
                tokens: tokens.clone(),
            };
            if let Err(err) = store.store.save(&store.profile, &record) {
                warn!(profile = %store.profile, error = %err, "failed to persist token state");
            }
        }
        Ok(())
    }
}
