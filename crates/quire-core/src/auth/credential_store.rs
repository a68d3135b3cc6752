use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigLocator;

use super::{AuthError, TokenState};

const ENVELOPE_VERSION: u32 = 2;

/// Token state as persisted for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Refresh token the session was seeded with from configuration, if any.
    /// A configured token that differs from this one invalidates the record.
    #[serde(default)]
    pub seed_refresh_token: Option<String>,
    pub tokens: TokenState,
}

impl StoredCredential {
    /// Whether this record continues the session seeded by `configured`.
    pub fn continues(&self, configured: Option<&str>) -> bool {
        match configured {
            None => true,
            Some(token) => {
                self.seed_refresh_token.as_deref() == Some(token)
                    || self.tokens.refresh_token.as_deref() == Some(token)
            }
        }
    }
}

/// Persistence abstraction for token state, keyed by profile name.
pub trait CredentialStore {
    fn load(&self, profile: &str) -> Result<Option<StoredCredential>, AuthError>;
    fn save(&self, profile: &str, credential: &StoredCredential) -> Result<(), AuthError>;
    fn delete(&self, profile: &str) -> Result<(), AuthError>;
}

/// One JSON file per profile in the user configuration directory.
pub struct FileCredentialStore {
    locator: ConfigLocator,
}

impl FileCredentialStore {
    pub fn new(locator: ConfigLocator) -> Self {
        Self { locator }
    }

    /// Store rooted at the platform configuration directory.
    pub fn with_default_locator() -> Result<Self, AuthError> {
        let locator = ConfigLocator::new()?;
        Ok(Self { locator })
    }
}

/// Write `payload` next to `path` and rename it into place, so readers never
/// observe a partial file and the secret is never world-readable.
fn replace_file(path: &Path, payload: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension("json.tmp");
    let _ = fs::remove_file(&staging);

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&staging)?;
    file.write_all(payload)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&staging, path)
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, profile: &str) -> Result<Option<StoredCredential>, AuthError> {
        let raw = match fs::read(self.locator.credentials_file(profile)) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let envelope: TokenEnvelope = serde_json::from_slice(&raw)?;
        Ok(Some(envelope.credential))
    }

    fn save(&self, profile: &str, credential: &StoredCredential) -> Result<(), AuthError> {
        let envelope = TokenEnvelope {
            version: ENVELOPE_VERSION,
            profile: profile.to_owned(),
            credential: credential.clone(),
        };
        let payload = serde_json::to_vec_pretty(&envelope)?;
        replace_file(&self.locator.credentials_file(profile), &payload)?;
        Ok(())
    }

    fn delete(&self, profile: &str) -> Result<(), AuthError> {
        fs::remove_file(self.locator.credentials_file(profile))
            .or_else(|err| match err.kind() {
                io::ErrorKind::NotFound => Ok(()),
                _ => Err(err),
            })
            .map_err(AuthError::from)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenEnvelope {
    version: u32,
    profile: String,
    #[serde(flatten)]
    credential: StoredCredential,
}
