//! HTTP long-polling transport, used when a websocket cannot be opened.
//!
//! The session is opened with `GET /socket/poll/handshake?token=…`, which
//! returns `{"sid": "…"}`. Inbound envelopes are fetched with
//! `GET /socket/poll?token=…&sid=…` (a JSON array per response) and outbound
//! envelopes are written with `POST` to the same URL. A `410 Gone` ends the
//! session from the server side.

use async_trait::async_trait;
use credentials::{ExposeSecret, SecretString};
use events::Envelope;
use log::*;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::error::{transport_error, unauthorized, Error, TransportErrorKind};
use crate::options::TransportKind;
use crate::transport::{Connector, DisconnectReason, Frame, TransportHandle, TransportPeer};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Deserialize)]
struct PollHandshake {
    sid: String,
}

#[derive(Debug, Clone)]
pub struct PollingConnector {
    http: reqwest::Client,
    poll_interval: Duration,
}

impl PollingConnector {
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http))
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Pause between polls that returned nothing.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn poll_url(endpoint: &Url, suffix: &str) -> Url {
    let mut url = endpoint.clone();
    let path = format!("{}/socket/poll{}", endpoint.path().trim_end_matches('/'), suffix);
    url.set_path(&path);
    url.set_query(None);
    url
}

#[async_trait]
impl Connector for PollingConnector {
    async fn open(&self, endpoint: &Url, token: &SecretString) -> Result<TransportHandle, Error> {
        let url = poll_url(endpoint, "/handshake");
        debug!("Opening polling session at {}", url);

        let response = self
            .http
            .get(url)
            .query(&[("token", token.expose_secret().as_str())])
            .send()
            .await?;

        let status = response.status();
        if matches!(status.as_u16(), 401 | 403) {
            return Err(unauthorized(format!(
                "polling handshake rejected with status {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(transport_error(
                TransportErrorKind::Connect,
                format!("polling handshake failed with status {}", status),
            ));
        }

        let handshake: PollHandshake = response.json().await?;
        debug!("Polling session {} opened", handshake.sid);

        let session = Session {
            http: self.http.clone(),
            url: poll_url(endpoint, ""),
            token: SecretString::new(token.expose_secret().clone()),
            sid: handshake.sid,
            interval: self.poll_interval,
        };
        let (handle, peer) = TransportHandle::pair(TransportKind::Polling);
        tokio::spawn(session.run(peer));
        Ok(handle)
    }
}

enum PollOutcome {
    Batch(Vec<Envelope>),
    Closed(String),
    Failed(String),
}

struct Session {
    http: reqwest::Client,
    url: Url,
    token: SecretString,
    sid: String,
    interval: Duration,
}

impl Session {
    async fn run(self, mut peer: TransportPeer) {
        let mut delay = Duration::ZERO;
        loop {
            let poll = self.poll(delay);
            tokio::pin!(poll);

            let outcome = loop {
                tokio::select! {
                    frame = peer.outbound.recv() => match frame {
                        Some(Frame::Envelope(envelope)) => {
                            if let Err(message) = self.post(&envelope).await {
                                peer.fail(message);
                                return;
                            }
                        }
                        Some(Frame::Close) | None => {
                            trace!("Ending polling session {} at client request", self.sid);
                            return;
                        }
                    },
                    outcome = &mut poll => break outcome,
                }
            };

            match outcome {
                PollOutcome::Batch(envelopes) => {
                    delay = if envelopes.is_empty() {
                        self.interval
                    } else {
                        Duration::ZERO
                    };
                    for envelope in envelopes {
                        if !peer.deliver(envelope) {
                            return;
                        }
                    }
                }
                PollOutcome::Closed(reason) => {
                    peer.closed(DisconnectReason::server(reason));
                    return;
                }
                PollOutcome::Failed(message) => {
                    peer.fail(message);
                    return;
                }
            }
        }
    }

    fn query(&self) -> [(&str, &str); 2] {
        [
            ("token", self.token.expose_secret().as_str()),
            ("sid", self.sid.as_str()),
        ]
    }

    async fn poll(&self, delay: Duration) -> PollOutcome {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let response = match self
            .http
            .get(self.url.clone())
            .query(&self.query())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return PollOutcome::Failed(format!("poll request failed: {}", e)),
        };

        match response.status().as_u16() {
            410 => PollOutcome::Closed("polling session closed by server".to_string()),
            401 | 403 => PollOutcome::Closed("credential rejected by server".to_string()),
            code if !(200..300).contains(&code) => {
                PollOutcome::Failed(format!("poll failed with status {}", code))
            }
            _ => match response.json::<Vec<Envelope>>().await {
                Ok(envelopes) => PollOutcome::Batch(envelopes),
                Err(e) => PollOutcome::Failed(format!("undecodable poll response: {}", e)),
            },
        }
    }

    async fn post(&self, envelope: &Envelope) -> Result<(), String> {
        let response = self
            .http
            .post(self.url.clone())
            .query(&self.query())
            .json(envelope)
            .send()
            .await
            .map_err(|e| format!("send failed: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("send failed with status {}", response.status()))
        }
    }
}
