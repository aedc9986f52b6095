//! Error types for the `credentials` crate.
//!
//! Follows the workspace pattern: a root Error struct holding an error kind and
//! an optional source for error chaining.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the credentials crate.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in credentials.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Storage(StorageErrorKind),
    Serialization,
}

/// Errors from the durable credential store.
#[derive(Debug, PartialEq)]
pub enum StorageErrorKind {
    Read,
    Write,
    Remove,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Storage(kind) => write!(f, "Credential storage error: {:?}", kind),
            ErrorKind::Serialization => write!(f, "Credential serialization error"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Serialization,
        }
    }
}

/// Helper function to create storage errors from an I/O failure.
pub fn storage_error(kind: StorageErrorKind, err: std::io::Error) -> Error {
    Error {
        source: Some(Box::new(err)),
        error_kind: ErrorKind::Storage(kind),
    }
}
