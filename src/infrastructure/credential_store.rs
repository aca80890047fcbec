use crate::domain::models::OAuthToken;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Token persistence seam. The production store is a plain file that is read
/// at startup and rewritten after every refresh; absence means offline mode,
/// never an error.
pub trait CredentialStore: Send + Sync {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError>;
    fn delete_token(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(token)?;
        fs::write(&self.path, format!("{payload}\n"))?;
        Ok(())
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let token = serde_json::from_str::<OAuthToken>(&raw)?;
        Ok(Some(token))
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    token: Mutex<Option<OAuthToken>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Auth(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(token.clone());
        Ok(())
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Auth(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Auth(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}
