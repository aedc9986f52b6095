//! Error types for the `api` crate.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for REST calls.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors returned by the REST client.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Http(HttpErrorKind),
    /// The backend answered 401; the stored credential has been cleared.
    Unauthorized,
    NotFound,
    /// Any other non-success status.
    Status(u16),
    /// The response body did not match the expected record.
    Decode,
    /// The credential store failed while persisting a login.
    Credential,
}

/// Errors from the HTTP layer itself.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Timeout,
    Network,
}

impl Error {
    pub fn is_unauthorized(&self) -> bool {
        self.error_kind == ErrorKind::Unauthorized
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind),
            ErrorKind::Unauthorized => write!(f, "Unauthorized"),
            ErrorKind::NotFound => write!(f, "Resource not found"),
            ErrorKind::Status(code) => match &self.source {
                Some(source) => write!(f, "Request failed with status {}: {}", code, source),
                None => write!(f, "Request failed with status {}", code),
            },
            ErrorKind::Decode => write!(f, "Failed to decode response body"),
            ErrorKind::Credential => write!(f, "Failed to persist credential"),
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

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_timeout() {
            ErrorKind::Http(HttpErrorKind::Timeout)
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else if err.is_decode() {
            ErrorKind::Decode
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Decode,
        }
    }
}

impl From<credentials::Error> for Error {
    fn from(err: credentials::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Credential,
        }
    }
}

/// Helper function to create an error for a non-success status.
pub fn status_error(code: u16, body: String) -> Error {
    let error_kind = match code {
        401 => ErrorKind::Unauthorized,
        404 => ErrorKind::NotFound,
        code => ErrorKind::Status(code),
    };
    Error {
        source: (!body.is_empty()).then(|| body.into()),
        error_kind,
    }
}
