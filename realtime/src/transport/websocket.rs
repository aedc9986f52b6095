//! WebSocket transport over tokio-tungstenite.

use async_trait::async_trait;
use credentials::{ExposeSecret, SecretString};
use events::Envelope;
use futures_util::{SinkExt, StreamExt};
use log::*;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::{config_error, ConfigErrorKind, Error};
use crate::options::TransportKind;
use crate::transport::{redacted, Connector, DisconnectReason, Frame, TransportHandle, TransportPeer};

const SOCKET_PATH: &str = "socket";

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

/// `http(s)://host/base` becomes `ws(s)://host/base/socket?token=…`.
pub fn socket_url(endpoint: &Url, token: &SecretString) -> Result<Url, Error> {
    let mut url = endpoint.clone();
    let scheme = match endpoint.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(config_error(
                ConfigErrorKind::InvalidEndpoint,
                format!("cannot open a websocket over '{}'", other),
            ))
        }
    };
    url.set_scheme(scheme).map_err(|_| {
        config_error(ConfigErrorKind::InvalidEndpoint, "endpoint cannot carry a websocket")
    })?;

    let path = format!("{}/{}", endpoint.path().trim_end_matches('/'), SOCKET_PATH);
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .append_pair("token", token.expose_secret());
    Ok(url)
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, endpoint: &Url, token: &SecretString) -> Result<TransportHandle, Error> {
        let url = socket_url(endpoint, token)?;
        debug!("Opening websocket to {}", redacted(&url));

        let (stream, _response) = connect_async(url.as_str()).await.map_err(|e| {
            let err = Error::from(e);
            if err.is_unauthorized() {
                warn!("Websocket handshake rejected the credential");
            }
            err
        })?;

        let (handle, peer) = TransportHandle::pair(TransportKind::WebSocket);
        tokio::spawn(pump(stream, peer));
        Ok(handle)
    }
}

async fn pump(stream: Stream, mut peer: TransportPeer) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = peer.outbound.recv() => match frame {
                Some(Frame::Envelope(envelope)) => {
                    let text = match envelope.to_text() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode '{}' frame: {}", envelope.event, e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::text(text)).await {
                        peer.fail(format!("websocket write failed: {}", e));
                        return;
                    }
                }
                Some(Frame::Close) | None => {
                    trace!("Closing websocket at client request");
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    return;
                }
            },
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => match Envelope::from_text(&text) {
                    Ok(envelope) => {
                        if !peer.deliver(envelope) {
                            return;
                        }
                    }
                    Err(e) => warn!("Dropping undecodable websocket frame: {}", e),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "server closed the connection".to_string());
                    peer.closed(DisconnectReason::server(reason));
                    return;
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    peer.fail(format!("websocket error: {}", e));
                    return;
                }
                None => {
                    peer.fail("websocket stream ended without a close frame");
                    return;
                }
            },
        }
    }
}
