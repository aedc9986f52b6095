//! Durable credential store backed by a JSON file.
//!
//! The file holds a single object with the token under `"token"` and the user
//! record under `"user"`. Every write goes through to disk before the in-memory
//! copy is updated, so readers never observe a credential that was not persisted.

use log::*;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::{storage_error, Error, StorageErrorKind};
use crate::provider::{CredentialProvider, StoredCredentials};

#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    cache: RwLock<StoredCredentials>,
}

impl FileCredentialStore {
    /// Open the store at `path`, loading any credential saved by a previous run.
    /// A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let stored = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => StoredCredentials::default(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == IoErrorKind::NotFound => StoredCredentials::default(),
            Err(e) => return Err(storage_error(StorageErrorKind::Read, e)),
        };

        debug!(
            "Opened credential store at {} (token present: {})",
            path.display(),
            stored.token.is_some()
        );

        Ok(Self {
            path,
            cache: RwLock::new(stored),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, apply: impl FnOnce(&mut StoredCredentials)) -> Result<(), Error> {
        let mut guard = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        apply(&mut next);

        if next == StoredCredentials::default() {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == IoErrorKind::NotFound => {}
                Err(e) => return Err(storage_error(StorageErrorKind::Remove, e)),
            }
        } else {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| storage_error(StorageErrorKind::Write, e))?;
            }
            let contents = serde_json::to_string_pretty(&next)?;
            fs::write(&self.path, contents)
                .map_err(|e| storage_error(StorageErrorKind::Write, e))?;
        }

        *guard = next;
        Ok(())
    }
}

impl CredentialProvider for FileCredentialStore {
    fn token(&self) -> Option<SecretString> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
            .map(SecretString::new)
    }

    fn set_token(&self, token: SecretString) -> Result<(), Error> {
        self.persist(|stored| stored.token = Some(token.expose_secret().clone()))
    }

    fn user(&self) -> Option<Value> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    fn set_user(&self, user: Value) -> Result<(), Error> {
        self.persist(|stored| stored.user = Some(user))
    }

    fn clear(&self) -> Result<(), Error> {
        info!("Clearing stored credentials");
        self.persist(|stored| *stored = StoredCredentials::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{TOKEN_KEY, USER_KEY};
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::open(dir.path().join("credentials.json")).unwrap();
        assert!(!store.has_token());
        assert!(store.user().is_none());
    }

    #[test]
    fn test_credentials_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.json");

        let store = FileCredentialStore::open(&path).unwrap();
        store
            .set_token(SecretString::new("jwt-token".to_string()))
            .unwrap();
        store
            .set_user(json!({ "gid": "u-1", "name": "Ana" }))
            .unwrap();

        let reopened = FileCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.token().unwrap().expose_secret(), "jwt-token");
        assert_eq!(reopened.user().unwrap()["name"], "Ana");
    }

    #[test]
    fn test_file_uses_fixed_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let store = FileCredentialStore::open(&path).unwrap();
        store.set_token(SecretString::new("abc".to_string())).unwrap();
        store.set_user(json!({ "gid": "u-1" })).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[TOKEN_KEY], "abc");
        assert_eq!(raw[USER_KEY]["gid"], "u-1");
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let store = FileCredentialStore::open(&path).unwrap();
        store.set_token(SecretString::new("abc".to_string())).unwrap();
        assert!(path.exists());

        store.clear().unwrap();

        assert!(!path.exists());
        assert!(!store.has_token());
    }

    #[test]
    fn test_corrupt_file_is_a_serialization_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileCredentialStore::open(&path).unwrap_err();
        assert_eq!(err.error_kind, crate::error::ErrorKind::Serialization);
    }
}
