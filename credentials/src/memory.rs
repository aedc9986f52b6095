//! Process-local credential store.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::{PoisonError, RwLock};

use crate::error::Error;
use crate::provider::{CredentialProvider, StoredCredentials};

/// Keeps the credential in memory only; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<StoredCredentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(StoredCredentials {
                token: Some(token.into()),
                user: None,
            }),
        }
    }

    pub fn snapshot(&self) -> StoredCredentials {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, apply: impl FnOnce(&mut StoredCredentials)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut guard);
    }
}

impl CredentialProvider for MemoryCredentialStore {
    fn token(&self) -> Option<SecretString> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
            .map(SecretString::new)
    }

    fn set_token(&self, token: SecretString) -> Result<(), Error> {
        self.update(|stored| stored.token = Some(token.expose_secret().clone()));
        Ok(())
    }

    fn user(&self) -> Option<Value> {
        self.snapshot().user
    }

    fn set_user(&self, user: Value) -> Result<(), Error> {
        self.update(|stored| stored.user = Some(user));
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        self.update(|stored| *stored = StoredCredentials::default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_is_read_fresh_after_update() {
        let store = MemoryCredentialStore::with_token("first");
        assert_eq!(store.token().unwrap().expose_secret(), "first");

        store
            .set_token(SecretString::new("second".to_string()))
            .unwrap();
        assert_eq!(store.token().unwrap().expose_secret(), "second");
    }

    #[test]
    fn test_clear_removes_token_and_user() {
        let store = MemoryCredentialStore::with_token("abc");
        store.set_user(json!({ "gid": "u-1" })).unwrap();

        store.clear().unwrap();

        assert!(!store.has_token());
        assert!(store.user().is_none());
    }
}
