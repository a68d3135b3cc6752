//! Core library for the Quire automation client: OAuth2 credential lifecycle,
//! the authenticated REST dispatcher, and resource services built on top of it.

pub mod api;
pub mod auth;
pub mod config;
pub mod services;

pub use api::{ApiError, QuireClient};
pub use auth::{AuthError, Credential, CredentialManager};
pub use config::{ConfigError, Settings};
