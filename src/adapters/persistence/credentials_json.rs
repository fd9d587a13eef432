//! Implements CredentialStore using a JSON file.
//!
//! `{ "api_id": ..., "api_hash": "...", "phone": "..." }`. Unreadable or
//! malformed files count as "not configured" and are logged.

use crate::domain::{Credentials, DomainError};
use crate::ports::CredentialStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

pub struct CredentialsJson {
    path: PathBuf,
}

impl CredentialsJson {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl CredentialStore for CredentialsJson {
    async fn load(&self) -> Result<Option<Credentials>, DomainError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DomainError::Storage(format!("read credentials: {}", e))),
        };
        match serde_json::from_str::<Credentials>(&text) {
            Ok(c) => Ok(Some(c)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed credentials file");
                Ok(None)
            }
        }
    }

    /// Atomic save: write a temp file, sync it, rename over the target.
    async fn save(&self, credentials: &Credentials) -> Result<(), DomainError> {
        let json = serde_json::to_string_pretty(credentials)
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Storage(format!("create config dir: {}", e)))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::Storage(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Storage(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::Storage(format!("sync temp file: {}", e)))?;
        drop(f);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DomainError::Storage(format!("atomic rename failed: {}", e)))?;
        info!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "credentials file deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DomainError::Storage(format!("delete credentials: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialsJson::new(dir.path().join("nested/telegram_config.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let creds = Credentials {
            api_id: 123,
            api_hash: "abc".into(),
            phone: Some("+100".into()),
        };
        store.save(&creds).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(creds));
        assert!(!dir.path().join("nested/telegram_config.json.tmp").exists());
    }

    #[tokio::test]
    async fn string_api_id_and_missing_phone_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telegram_config.json");
        std::fs::write(&path, r#"{"api_id": "4567", "api_hash": "h"}"#).unwrap();

        let loaded = CredentialsJson::new(&path).load().await.unwrap().unwrap();
        assert_eq!(loaded.api_id, 4567);
        assert_eq!(loaded.phone, None);
    }

    #[tokio::test]
    async fn malformed_file_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telegram_config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(CredentialsJson::new(&path).load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialsJson::new(dir.path().join("c.json"));
        store
            .save(&Credentials {
                api_id: 1,
                api_hash: "h".into(),
                phone: None,
            })
            .await
            .unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
