//! Error types for the `realtime` crate.

use std::error::Error as StdError;
use std::fmt;

use tokio_tungstenite::tungstenite;

/// Top-level error type for the realtime layer.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Config(ConfigErrorKind),
    Transport(TransportErrorKind),
    /// The server rejected the bearer credential during the handshake.
    Unauthorized,
    /// The credential provider failed to persist an update.
    Credential,
}

#[derive(Debug, PartialEq)]
pub enum ConfigErrorKind {
    InvalidEndpoint,
    UnknownTransport,
    NoTransports,
}

#[derive(Debug, PartialEq)]
pub enum TransportErrorKind {
    /// The connection could not be opened.
    Connect,
    /// The handshake did not complete within the configured timeout.
    Timeout,
    /// The server answered with something other than the expected protocol.
    Protocol,
}

impl Error {
    pub fn is_unauthorized(&self) -> bool {
        self.error_kind == ErrorKind::Unauthorized
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let description = match &self.error_kind {
            ErrorKind::Config(kind) => format!("Configuration error: {:?}", kind),
            ErrorKind::Transport(kind) => format!("Transport error: {:?}", kind),
            ErrorKind::Unauthorized => "Unauthorized".to_string(),
            ErrorKind::Credential => "Credential store error".to_string(),
        };
        match &self.source {
            Some(source) => write!(f, "{}: {}", description, source),
            None => write!(f, "{}", description),
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

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Config(ConfigErrorKind::InvalidEndpoint),
        }
    }
}

impl From<tungstenite::Error> for Error {
    fn from(err: tungstenite::Error) -> Self {
        let error_kind = match &err {
            tungstenite::Error::Http(response)
                if matches!(response.status().as_u16(), 401 | 403) =>
            {
                ErrorKind::Unauthorized
            }
            tungstenite::Error::Http(_)
            | tungstenite::Error::Protocol(_)
            | tungstenite::Error::Url(_) => ErrorKind::Transport(TransportErrorKind::Protocol),
            _ => ErrorKind::Transport(TransportErrorKind::Connect),
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_timeout() {
            ErrorKind::Transport(TransportErrorKind::Timeout)
        } else if err.is_decode() {
            ErrorKind::Transport(TransportErrorKind::Protocol)
        } else {
            ErrorKind::Transport(TransportErrorKind::Connect)
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
            error_kind: ErrorKind::Transport(TransportErrorKind::Protocol),
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

/// Helper function to create a configuration error with a message.
pub fn config_error(kind: ConfigErrorKind, message: impl Into<String>) -> Error {
    Error {
        source: Some(Into::<String>::into(message).into()),
        error_kind: ErrorKind::Config(kind),
    }
}

/// Helper function to create a transport error with a message.
pub fn transport_error(kind: TransportErrorKind, message: impl Into<String>) -> Error {
    Error {
        source: Some(Into::<String>::into(message).into()),
        error_kind: ErrorKind::Transport(kind),
    }
}

pub fn unauthorized(message: impl Into<String>) -> Error {
    Error {
        source: Some(Into::<String>::into(message).into()),
        error_kind: ErrorKind::Unauthorized,
    }
}
