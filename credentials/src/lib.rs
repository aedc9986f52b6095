//! # credentials
//!
//! Single source of truth for the bearer credential used by the Taskboard client.
//!
//! The token is set at login, replaced on refresh and cleared at logout. Every
//! consumer (the realtime connection and the REST client) receives the same
//! [`CredentialProvider`] and reads the token fresh on each use, so a token
//! update is visible everywhere at once.
//!
//! ## Stores
//!
//! - [`MemoryCredentialStore`]: process-local, used by tests and short-lived tools
//! - [`FileCredentialStore`]: durable JSON file holding the token and user record
//!   under fixed keys

pub mod error;
pub mod file;
pub mod memory;
pub mod provider;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;
pub use provider::{CredentialProvider, StoredCredentials, TOKEN_KEY, USER_KEY};
pub use secrecy::{ExposeSecret, SecretString};
