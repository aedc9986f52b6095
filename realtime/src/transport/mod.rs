//! Transports carrying [`Envelope`] frames between the client and the server.
//!
//! A [`Connector`] performs the handshake and, on success, hands back a
//! [`TransportHandle`]. The handle is the connection manager's side of a pair
//! of channels; the other side, [`TransportPeer`], is owned by the task that
//! pumps the actual socket (or, in tests, by the test itself).

use async_trait::async_trait;
use credentials::SecretString;
use events::Envelope;
use log::*;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use url::Url;

use crate::error::{config_error, ConfigErrorKind, Error};
use crate::options::{SyncOptions, TransportKind};

pub mod polling;
pub mod websocket;

pub use polling::PollingConnector;
pub use websocket::WebSocketConnector;

/// Frames the connection manager asks a transport to write.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Envelope(Envelope),
    /// Close the connection from the client side.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    /// The server closed the session; the client reconnects.
    Server,
    /// The client asked for the close; nothing further happens.
    Client,
    /// The connection was lost without a close handshake.
    Transport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectReason {
    pub kind: DisconnectKind,
    pub message: String,
}

impl DisconnectReason {
    pub fn server(message: impl Into<String>) -> Self {
        Self {
            kind: DisconnectKind::Server,
            message: message.into(),
        }
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self {
            kind: DisconnectKind::Client,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: DisconnectKind::Transport,
            message: message.into(),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} disconnect: {}", self.kind, self.message)
    }
}

/// What a transport reports back to the connection manager.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message(Envelope),
    Closed(DisconnectReason),
    Failed(String),
}

/// The connection manager's end of an open transport.
///
/// Dropping the handle closes the outbound channel, which the pump treats as a
/// client-side close.
#[derive(Debug)]
pub struct TransportHandle {
    kind: TransportKind,
    outbound: UnboundedSender<Frame>,
    events: UnboundedReceiver<TransportEvent>,
}

/// The socket side of a [`TransportHandle`].
#[derive(Debug)]
pub struct TransportPeer {
    pub outbound: UnboundedReceiver<Frame>,
    pub events: UnboundedSender<TransportEvent>,
}

impl TransportHandle {
    pub fn pair(kind: TransportKind) -> (TransportHandle, TransportPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            TransportHandle {
                kind,
                outbound: outbound_tx,
                events: events_rx,
            },
            TransportPeer {
                outbound: outbound_rx,
                events: events_tx,
            },
        )
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Queue an envelope for the server. Returns `false` if the pump has stopped.
    pub fn send(&self, envelope: Envelope) -> bool {
        self.outbound.send(Frame::Envelope(envelope)).is_ok()
    }

    pub fn close(&self) {
        let _ = self.outbound.send(Frame::Close);
    }

    /// Next event from the pump; `None` once the pump has gone away.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

impl TransportPeer {
    pub fn deliver(&self, envelope: Envelope) -> bool {
        self.events.send(TransportEvent::Message(envelope)).is_ok()
    }

    pub fn closed(&self, reason: DisconnectReason) {
        let _ = self.events.send(TransportEvent::Closed(reason));
    }

    pub fn fail(&self, message: impl Into<String>) {
        let _ = self.events.send(TransportEvent::Failed(message.into()));
    }
}

/// Performs the handshake for one transport.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection to `endpoint`, authenticating with `token`.
    ///
    /// Implementations return [`crate::ErrorKind::Unauthorized`] when the server
    /// rejects the credential so callers can tell it apart from a network error.
    async fn open(&self, endpoint: &Url, token: &SecretString) -> Result<TransportHandle, Error>;
}

/// Tries each configured transport in order until one connects.
///
/// A rejected credential ends the negotiation: it would be rejected on every
/// transport.
pub struct NegotiatingConnector {
    connectors: Vec<(TransportKind, Arc<dyn Connector>)>,
}

impl NegotiatingConnector {
    pub fn new(connectors: Vec<(TransportKind, Arc<dyn Connector>)>) -> Result<Self, Error> {
        if connectors.is_empty() {
            return Err(config_error(
                ConfigErrorKind::NoTransports,
                "no transports configured",
            ));
        }
        Ok(Self { connectors })
    }

    /// Build the standard connectors in the order `options.transports` lists them.
    pub fn from_options(options: &SyncOptions) -> Result<Self, Error> {
        let mut connectors: Vec<(TransportKind, Arc<dyn Connector>)> = Vec::new();
        for kind in &options.transports {
            let connector: Arc<dyn Connector> = match kind {
                TransportKind::WebSocket => Arc::new(WebSocketConnector::new()),
                TransportKind::Polling => Arc::new(PollingConnector::new()?),
            };
            connectors.push((*kind, connector));
        }
        Self::new(connectors)
    }

    pub fn kinds(&self) -> Vec<TransportKind> {
        self.connectors.iter().map(|(kind, _)| *kind).collect()
    }
}

#[async_trait]
impl Connector for NegotiatingConnector {
    async fn open(&self, endpoint: &Url, token: &SecretString) -> Result<TransportHandle, Error> {
        let mut last_error = None;
        for (kind, connector) in &self.connectors {
            debug!("Attempting {} transport", kind);
            match connector.open(endpoint, token).await {
                Ok(handle) => return Ok(handle),
                Err(e) if e.is_unauthorized() => return Err(e),
                Err(e) => {
                    warn!("{} transport failed: {}", kind, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            config_error(ConfigErrorKind::NoTransports, "no transports configured")
        }))
    }
}

/// Strip the credential from a URL before it is logged.
pub(crate) fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{transport_error, unauthorized, TransportErrorKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        outcome: fn() -> Result<TransportHandle, Error>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(outcome: fn() -> Result<TransportHandle, Error>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Connector for Fixed {
        async fn open(&self, _: &Url, _: &SecretString) -> Result<TransportHandle, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn endpoint() -> Url {
        Url::parse("http://localhost:5001").unwrap()
    }

    fn token() -> SecretString {
        SecretString::new("jwt".to_string())
    }

    #[tokio::test]
    async fn test_falls_back_on_transport_error() {
        let websocket = Fixed::new(|| Err(transport_error(TransportErrorKind::Connect, "refused")));
        let polling = Fixed::new(|| Ok(TransportHandle::pair(TransportKind::Polling).0));
        let negotiator = NegotiatingConnector::new(vec![
            (TransportKind::WebSocket, websocket.clone() as Arc<dyn Connector>),
            (TransportKind::Polling, polling.clone() as Arc<dyn Connector>),
        ])
        .unwrap();

        let handle = negotiator.open(&endpoint(), &token()).await.unwrap();

        assert_eq!(handle.kind(), TransportKind::Polling);
        assert_eq!(websocket.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_stops_negotiation() {
        let websocket = Fixed::new(|| Err(unauthorized("401")));
        let polling = Fixed::new(|| Ok(TransportHandle::pair(TransportKind::Polling).0));
        let negotiator = NegotiatingConnector::new(vec![
            (TransportKind::WebSocket, websocket as Arc<dyn Connector>),
            (TransportKind::Polling, polling.clone() as Arc<dyn Connector>),
        ])
        .unwrap();

        let err = negotiator.open(&endpoint(), &token()).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(polling.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_failing_returns_last_error() {
        let negotiator = NegotiatingConnector::new(vec![(
            TransportKind::WebSocket,
            Fixed::new(|| Err(transport_error(TransportErrorKind::Timeout, "slow"))) as Arc<dyn Connector>,
        )])
        .unwrap();

        let err = negotiator.open(&endpoint(), &token()).await.unwrap_err();
        assert_eq!(
            err.error_kind,
            crate::error::ErrorKind::Transport(TransportErrorKind::Timeout)
        );
    }

    #[test]
    fn test_handle_close_and_drop_reach_the_peer() {
        let (handle, mut peer) = TransportHandle::pair(TransportKind::WebSocket);
        assert!(handle.send(Envelope::new("join_project", serde_json::json!({}))));
        handle.close();
        drop(handle);

        assert!(matches!(peer.outbound.try_recv(), Ok(Frame::Envelope(_))));
        assert_eq!(peer.outbound.try_recv(), Ok(Frame::Close));
        assert!(peer.outbound.try_recv().is_err());
    }

    #[test]
    fn test_redacted_drops_token() {
        let url = Url::parse("ws://localhost:5001/socket?token=secret").unwrap();
        assert_eq!(redacted(&url), "ws://localhost:5001/socket");
    }

    #[test]
    fn test_requires_a_transport() {
        assert!(NegotiatingConnector::new(Vec::new()).is_err());
    }
}
