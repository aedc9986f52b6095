//! Connection options for [`crate::SyncClient`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::backoff::ReconnectPolicy;
use crate::error::{config_error, ConfigErrorKind, Error};
use crate::presence::DEFAULT_TYPING_EXPIRY;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5001";
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(20_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    WebSocket,
    Polling,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::WebSocket => "websocket",
            TransportKind::Polling => "polling",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(TransportKind::WebSocket),
            "polling" => Ok(TransportKind::Polling),
            other => Err(config_error(
                ConfigErrorKind::UnknownTransport,
                format!("unknown transport '{}'", other),
            )),
        }
    }
}

/// Parse an ordered, comma-separated transport preference such as `"websocket,polling"`.
pub fn parse_transports(list: &str) -> Result<Vec<TransportKind>, Error> {
    let mut kinds = Vec::new();
    for part in list.split(',').filter(|part| !part.trim().is_empty()) {
        let kind: TransportKind = part.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(config_error(
            ConfigErrorKind::NoTransports,
            "at least one transport is required",
        ));
    }
    Ok(kinds)
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Base endpoint of the realtime server, e.g. `http://localhost:5001`.
    pub endpoint: String,
    /// Transports to try, in order.
    pub transports: Vec<TransportKind>,
    pub handshake_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub typing_expiry: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            typing_expiry: DEFAULT_TYPING_EXPIRY,
        }
    }
}

impl SyncOptions {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_transports(mut self, transports: Vec<TransportKind>) -> Self {
        self.transports = transports;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_typing_expiry(mut self, expiry: Duration) -> Self {
        self.typing_expiry = expiry;
        self
    }

    pub(crate) fn endpoint_url(&self) -> Result<Url, Error> {
        let url = Url::parse(&self.endpoint)?;
        match url.scheme() {
            "http" | "https" | "ws" | "wss" => Ok(url),
            scheme => Err(config_error(
                ConfigErrorKind::InvalidEndpoint,
                format!("unsupported endpoint scheme '{}'", scheme),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let options = SyncOptions::default();
        assert_eq!(options.endpoint, "http://localhost:5001");
        assert_eq!(
            options.transports,
            vec![TransportKind::WebSocket, TransportKind::Polling]
        );
        assert_eq!(options.handshake_timeout, Duration::from_millis(20_000));
        assert_eq!(options.typing_expiry, Duration::from_millis(3000));
    }

    #[test]
    fn test_parse_transports_keeps_order_and_drops_duplicates() {
        assert_eq!(
            parse_transports("polling, websocket,polling").unwrap(),
            vec![TransportKind::Polling, TransportKind::WebSocket]
        );
    }

    #[test]
    fn test_parse_transports_rejects_unknown_and_empty() {
        let err = parse_transports("websocket,carrier-pigeon").unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Config(ConfigErrorKind::UnknownTransport)
        );

        let err = parse_transports(" , ").unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Config(ConfigErrorKind::NoTransports));
    }

    #[test]
    fn test_endpoint_scheme_is_checked() {
        assert!(SyncOptions::default().endpoint_url().is_ok());
        let err = SyncOptions::default()
            .with_endpoint("ftp://localhost")
            .endpoint_url()
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Config(ConfigErrorKind::InvalidEndpoint)
        );
    }
}
