mod credential;
mod credential_store;
mod error;
mod manager;
mod manual;
mod oauth;
#[cfg(test)]
pub(crate) mod test_support;

pub use credential::{
    ClientIdentity, Clock, Credential, SystemClock, TokenResponse, TokenState,
    DEFAULT_EXPIRES_IN_SECS, SAFETY_MARGIN_SECS,
};
pub use credential_store::{CredentialStore, FileCredentialStore, StoredCredential};
pub use error::AuthError;
pub use manager::CredentialManager;
pub use manual::{parse_authorization_input, run_manual_flow};
pub use oauth::{
    OAuthClient, OAuthEndpoints, DEFAULT_AUTHORIZATION_URL, DEFAULT_REDIRECT_URI,
    DEFAULT_TOKEN_URL,
};
