//! Credential provider trait shared by the realtime and REST layers.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Key under which the bearer token is stored.
pub const TOKEN_KEY: &str = "token";
/// Key under which the authenticated user record is stored.
pub const USER_KEY: &str = "user";

/// Everything a store persists, keyed by [`TOKEN_KEY`] and [`USER_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(rename = "token", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "user", default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
}

/// Trait for reading and writing the process-wide bearer credential.
///
/// Reads are synchronous and cheap: the realtime connection reads the token on
/// every handshake attempt and the REST client on every request, so neither ever
/// holds a stale copy across an update.
///
/// Implementations should:
/// - Never log the token
/// - Handle concurrent access safely
pub trait CredentialProvider: Send + Sync {
    /// The current bearer token, if one is set.
    fn token(&self) -> Option<SecretString>;

    /// Replace the bearer token.
    fn set_token(&self, token: SecretString) -> Result<(), Error>;

    /// The stored user record, if any.
    fn user(&self) -> Option<Value>;

    /// Replace the stored user record.
    fn set_user(&self, user: Value) -> Result<(), Error>;

    /// Remove both the token and the user record.
    fn clear(&self) -> Result<(), Error>;

    fn has_token(&self) -> bool {
        self.token().is_some()
    }
}
