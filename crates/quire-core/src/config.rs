use std::env;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;

use crate::auth::Credential;

pub const DEFAULT_API_BASE: &str = "https://quire.io/api";

pub const ENV_CLIENT_ID: &str = "QUIRE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "QUIRE_CLIENT_SECRET";
pub const ENV_REFRESH_TOKEN: &str = "QUIRE_REFRESH_TOKEN";
pub const ENV_API_BASE: &str = "QUIRE_API_BASE";

/// Externally sourced settings consumed by the core.
///
/// Nothing here is read lazily: callers build a `Settings` once, turn it into a
/// [`Credential`], and pass both down explicitly.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub api_base: Option<String>,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function (environment, file, test map).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            client_id: read(ENV_CLIENT_ID),
            client_secret: read(ENV_CLIENT_SECRET),
            refresh_token: read(ENV_REFRESH_TOKEN),
            api_base: read(ENV_API_BASE),
        }
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    /// Build the credential, failing immediately when the client identity is incomplete.
    pub fn credential(&self) -> Result<Credential, ConfigError> {
        let credential = Credential::new(
            self.client_id.clone().unwrap_or_default(),
            self.client_secret.clone().unwrap_or_default(),
        )?;
        Ok(match &self.refresh_token {
            Some(token) => credential.with_refresh_token(token.clone()),
            None => credential,
        })
    }
}

/// Application-specific configuration helpers.
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    root: PathBuf,
}

impl ConfigLocator {
    /// Attempt to discover the persistent configuration directory, creating it if needed.
    pub fn new() -> Result<Self, ConfigError> {
        let dirs =
            ProjectDirs::from("io", "quire", "quire-rs").ok_or(ConfigError::MissingProjectDirs)?;
        let config_dir = dirs.config_dir();
        fs::create_dir_all(config_dir).map_err(ConfigError::CreateDir)?;
        set_user_only_permissions(config_dir)?;
        Ok(Self {
            root: config_dir.to_path_buf(),
        })
    }

    /// Use an explicit directory instead of the platform default.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path to the credentials file for the given profile.
    pub fn credentials_file(&self, profile: &str) -> PathBuf {
        self.root.join(format!("credentials-{profile}.json"))
    }
}

fn set_user_only_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        let metadata = fs::metadata(path)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o700);
        fs::set_permissions(path, permissions)?;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

/// Required configuration that is absent or unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("client id is required (set {ENV_CLIENT_ID})")]
    MissingClientId,
    #[error("client secret is required (set {ENV_CLIENT_SECRET})")]
    MissingClientSecret,
    #[error("refresh token not set; run the OAuth authorization flow first")]
    MissingRefreshToken,
    #[error("unable to determine configuration directory for quire-rs")]
    MissingProjectDirs,
    #[error("failed to create configuration directory: {0}")]
    CreateDir(#[source] std::io::Error),
    #[error("filesystem error: {0}")]
    Io(#[source] std::io::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::TempDir;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn credentials_file_appends_profile() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ConfigLocator::from_root(temp_dir.path());
        let path = locator.credentials_file("default");
        assert!(path.ends_with("credentials-default.json"));
    }

    #[test]
    fn api_base_defaults_when_unset() {
        let settings = settings(&[]);
        assert_eq!(settings.api_base(), DEFAULT_API_BASE);

        let settings = settings_with_base();
        assert_eq!(settings.api_base(), "http://localhost:1234/api");
    }

    fn settings_with_base() -> Settings {
        settings(&[(ENV_API_BASE, "http://localhost:1234/api")])
    }

    #[test]
    fn blank_values_count_as_missing() {
        let settings = settings(&[(ENV_CLIENT_ID, "  "), (ENV_CLIENT_SECRET, "secret")]);
        assert!(settings.client_id.is_none());
        assert!(matches!(
            settings.credential().unwrap_err(),
            ConfigError::MissingClientId
        ));
    }

    #[test]
    fn credential_carries_refresh_token() {
        let settings = settings(&[
            (ENV_CLIENT_ID, "a"),
            (ENV_CLIENT_SECRET, "b"),
            (ENV_REFRESH_TOKEN, "r0"),
        ]);
        let credential = settings.credential().unwrap();
        assert_eq!(credential.client_id(), "a");
        assert_eq!(credential.refresh_token(), Some("r0"));
    }

    #[test]
    fn missing_secret_is_reported() {
        let settings = settings(&[(ENV_CLIENT_ID, "a")]);
        assert!(matches!(
            settings.credential().unwrap_err(),
            ConfigError::MissingClientSecret
        ));
    }
}
