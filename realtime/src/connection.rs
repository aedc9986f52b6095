//! Connection manager: one transport, one driver task.
//!
//! [`SyncClient`] is the public handle. Every call enqueues a [`Command`] for
//! the driver task, which owns the connection state, the transport handle, the
//! reconnect timer and the room set, and processes commands, handshake results,
//! transport events and timer expiries one at a time. Callers therefore never
//! observe a half-applied transition, and must not assume that a command has
//! taken effect when the call returns.
//!
//! A handshake runs in its own task so the driver keeps serving commands while
//! it is in flight. Each handshake is tagged with a generation; a result whose
//! generation is stale (the client disconnected or re-handshook meanwhile) is
//! discarded and its transport closed.

use credentials::{CredentialProvider, SecretString};
use events::{ConnectionErrorKind, EventType, Outbound};
use log::*;
use serde_json::Value;
use std::fmt;
use std::future::pending;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, timeout, Instant};
use url::Url;

use crate::error::{transport_error, Error, TransportErrorKind};
use crate::options::SyncOptions;
use crate::presence::PresenceAggregator;
use crate::rooms::{Room, RoomSet};
use crate::router::{EventRouter, Routed};
use crate::transport::{
    Connector, DisconnectKind, DisconnectReason, NegotiatingConnector, TransportEvent,
    TransportHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// The user-visible connection indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Disconnected,
}

impl From<bool> for ConnectionStatus {
    fn from(connected: bool) -> Self {
        if connected {
            ConnectionStatus::Online
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

impl From<ConnectionState> for ConnectionStatus {
    fn from(state: ConnectionState) -> Self {
        ConnectionStatus::from(state == ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionStatus::Online => f.write_str("Online"),
            ConnectionStatus::Disconnected => f.write_str("Disconnected"),
        }
    }
}

enum Command {
    Connect,
    Disconnect,
    CredentialUpdated,
    Join(Room),
    Leave(Room),
    Send(Outbound),
    JoinedRooms(oneshot::Sender<Vec<Room>>),
    Shutdown,
}

struct HandshakeOutcome {
    generation: u64,
    result: Result<TransportHandle, Error>,
}

/// Public handle to the realtime connection.
///
/// Dropping the client stops its driver task and closes the transport.
pub struct SyncClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    router: EventRouter,
    presence: PresenceAggregator,
    credentials: Arc<dyn CredentialProvider>,
}

impl SyncClient {
    /// Build a client that negotiates the transports listed in `options`.
    ///
    /// Must be called from within a tokio runtime; the driver task is spawned here.
    pub fn new(options: SyncOptions, credentials: Arc<dyn CredentialProvider>) -> Result<Self, Error> {
        let connector = Arc::new(NegotiatingConnector::from_options(&options)?);
        Self::with_connector(options, credentials, connector)
    }

    pub fn with_connector(
        options: SyncOptions,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, Error> {
        let endpoint = options.endpoint_url()?;
        let router = EventRouter::new();
        let presence = PresenceAggregator::new(options.typing_expiry);
        presence.attach(&router).detach();

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let driver = Driver {
            options,
            endpoint,
            connector,
            credentials: credentials.clone(),
            router: router.clone(),
            commands: commands_rx,
            outcomes_tx,
            outcomes: outcomes_rx,
            state: ConnectionState::Disconnected,
            state_tx,
            transport: None,
            attempts: 0,
            generation: 0,
            retry_at: None,
            rooms: RoomSet::new(),
        };
        tokio::spawn(driver.run());

        Ok(Self {
            commands: commands_tx,
            state: state_rx,
            router,
            presence,
            credentials,
        })
    }

    /// Open the connection if it is not already open or opening.
    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    /// Persist a new bearer token; an open connection re-handshakes with it.
    pub fn update_credential(&self, token: impl Into<String>) -> Result<(), Error> {
        self.credentials.set_token(SecretString::new(token.into()))?;
        self.command(Command::CredentialUpdated);
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state().into()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn join_project(&self, project_gid: impl Into<String>) {
        self.command(Command::Join(Room::Project(project_gid.into())));
    }

    pub fn leave_project(&self, project_gid: impl Into<String>) {
        self.command(Command::Leave(Room::Project(project_gid.into())));
    }

    pub fn join_workspace(&self, workspace_gid: impl Into<String>) {
        self.command(Command::Join(Room::Workspace(workspace_gid.into())));
    }

    /// Broadcast a live edit of a task. Dropped while disconnected.
    pub fn send_task_update(
        &self,
        task_gid: impl Into<String>,
        update_type: impl Into<String>,
        update_data: Value,
    ) {
        self.command(Command::Send(Outbound::TaskUpdate {
            task_gid: task_gid.into(),
            update_type: update_type.into(),
            update_data,
        }));
    }

    /// Tell collaborators the local user started or stopped typing. Dropped while disconnected.
    pub fn send_typing_indicator(
        &self,
        target_type: impl Into<String>,
        target_gid: impl Into<String>,
        field: impl Into<String>,
        is_typing: bool,
    ) {
        self.command(Command::Send(Outbound::TypingIndicator {
            target_type: target_type.into(),
            target_gid: target_gid.into(),
            field: field.into(),
            is_typing,
        }));
    }

    /// Rooms the client will be in whenever it is connected.
    ///
    /// Resolves after every command issued before it has been processed.
    pub async fn joined_rooms(&self) -> Vec<Room> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::JoinedRooms(tx));
        rx.await.unwrap_or_default()
    }

    pub fn events(&self) -> &EventRouter {
        &self.router
    }

    pub fn presence(&self) -> &PresenceAggregator {
        &self.presence
    }

    /// Disconnect, wait until the driver has published `Disconnected`, then stop it.
    pub async fn close(&self) {
        let mut state = self.watch_state();
        self.disconnect();
        if state
            .wait_for(|state| *state == ConnectionState::Disconnected)
            .await
            .is_err()
        {
            debug!("Sync driver stopped before the disconnect was observed");
        }
        self.shutdown();
    }

    /// Stop the driver task. Further commands are ignored.
    pub fn shutdown(&self) {
        self.command(Command::Shutdown);
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Sync driver has stopped; command ignored");
        }
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

impl fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncClient")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

enum Wake {
    Command(Option<Command>),
    Handshake(HandshakeOutcome),
    Transport(TransportEvent),
    Retry,
}

struct Driver {
    options: SyncOptions,
    endpoint: Url,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialProvider>,
    router: EventRouter,
    commands: mpsc::UnboundedReceiver<Command>,
    outcomes_tx: mpsc::UnboundedSender<HandshakeOutcome>,
    outcomes: mpsc::UnboundedReceiver<HandshakeOutcome>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    transport: Option<TransportHandle>,
    attempts: u32,
    generation: u64,
    retry_at: Option<Instant>,
    rooms: RoomSet,
}

impl Driver {
    async fn run(mut self) {
        debug!("Sync driver started for {}", self.endpoint);
        loop {
            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                Some(outcome) = self.outcomes.recv() => Wake::Handshake(outcome),
                event = next_transport_event(&mut self.transport) => Wake::Transport(event),
                _ = wait_until(self.retry_at) => Wake::Retry,
            };

            match wake {
                Wake::Command(None) | Wake::Command(Some(Command::Shutdown)) => break,
                Wake::Command(Some(command)) => self.handle_command(command),
                Wake::Handshake(outcome) => self.handle_handshake(outcome),
                Wake::Transport(event) => self.handle_transport_event(event),
                Wake::Retry => {
                    self.retry_at = None;
                    if self.state == ConnectionState::Disconnected {
                        self.begin_connect();
                    }
                }
            }
        }

        self.close_transport();
        self.set_state(ConnectionState::Disconnected);
        debug!("Sync driver stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Disconnect => self.disconnect(),
            Command::CredentialUpdated => match self.state {
                ConnectionState::Connected | ConnectionState::Connecting => {
                    info!("Credential updated, re-handshaking");
                    self.disconnect();
                    self.connect();
                }
                ConnectionState::Disconnected => self.attempts = 0,
            },
            Command::Join(room) => {
                if self.rooms.join(room.clone()) {
                    debug!("Recorded room {}", room);
                }
                if self.state == ConnectionState::Connected {
                    self.transmit(&room.join_message());
                }
            }
            Command::Leave(room) => {
                self.rooms.leave(&room);
                if self.state == ConnectionState::Connected {
                    if let Some(message) = room.leave_message() {
                        self.transmit(&message);
                    }
                }
            }
            Command::Send(outbound) => {
                if self.state == ConnectionState::Connected {
                    self.transmit(&outbound);
                } else {
                    debug!(
                        "Dropping '{}' while {}",
                        outbound.event_type(),
                        self.state
                    );
                }
            }
            Command::JoinedRooms(reply) => {
                let _ = reply.send(self.rooms.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn connect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            debug!("Connect ignored, already {}", self.state);
            return;
        }
        self.attempts = 0;
        self.retry_at = None;
        self.begin_connect();
    }

    fn disconnect(&mut self) {
        // Invalidate any handshake still in flight.
        self.generation += 1;
        self.retry_at = None;
        self.attempts = 0;
        if self.close_transport() {
            info!("Disconnected by client");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn begin_connect(&mut self) {
        let Some(token) = self.credentials.token() else {
            warn!("No credential available; not connecting");
            self.router.emit_connection_error(
                ConnectionErrorKind::MissingCredential,
                "no credential available",
            );
            return;
        };

        self.generation += 1;
        self.set_state(ConnectionState::Connecting);

        let generation = self.generation;
        let connector = self.connector.clone();
        let endpoint = self.endpoint.clone();
        let handshake_timeout = self.options.handshake_timeout;
        let outcomes = self.outcomes_tx.clone();
        debug!("Starting handshake {}", generation);

        tokio::spawn(async move {
            let result = match timeout(handshake_timeout, connector.open(&endpoint, &token)).await
            {
                Ok(result) => result,
                Err(_) => Err(transport_error(
                    TransportErrorKind::Timeout,
                    format!("handshake timed out after {:?}", handshake_timeout),
                )),
            };
            let _ = outcomes.send(HandshakeOutcome { generation, result });
        });
    }

    fn handle_handshake(&mut self, outcome: HandshakeOutcome) {
        if outcome.generation != self.generation || self.state != ConnectionState::Connecting {
            debug!("Discarding result of stale handshake {}", outcome.generation);
            if let Ok(handle) = outcome.result {
                handle.close();
            }
            return;
        }

        match outcome.result {
            Ok(handle) => {
                info!("Connected over {}", handle.kind());
                self.transport = Some(handle);
                self.attempts = 0;
                for message in self.rooms.replay() {
                    self.transmit(&message);
                }
                self.set_state(ConnectionState::Connected);
            }
            Err(e) if e.is_unauthorized() => {
                error!("Server rejected the credential: {}", e);
                self.set_state(ConnectionState::Disconnected);
                self.router
                    .emit_connection_error(ConnectionErrorKind::Unauthorized, e.to_string());
            }
            Err(e) => {
                warn!("Connection attempt failed: {}", e);
                self.set_state(ConnectionState::Disconnected);
                self.router
                    .emit_connection_error(ConnectionErrorKind::Transport, e.to_string());
                self.schedule_reconnect();
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(envelope) => {
                if let Routed::Disconnect(reason) = self.router.route(&envelope) {
                    self.dropped(DisconnectReason::server(reason));
                }
            }
            TransportEvent::Closed(reason) => self.dropped(reason),
            TransportEvent::Failed(message) => self.dropped(DisconnectReason::transport(message)),
        }
    }

    fn dropped(&mut self, reason: DisconnectReason) {
        self.close_transport();
        self.set_state(ConnectionState::Disconnected);

        match reason.kind {
            DisconnectKind::Client => info!("Connection closed: {}", reason.message),
            DisconnectKind::Server => {
                warn!("Server closed the connection: {}", reason.message);
                self.schedule_reconnect();
            }
            DisconnectKind::Transport => {
                warn!("Connection lost: {}", reason.message);
                self.router
                    .emit_connection_error(ConnectionErrorKind::Transport, reason.message);
                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        let attempt = self.attempts + 1;
        match self.options.reconnect.delay_for(attempt) {
            Some(delay) => {
                self.attempts = attempt;
                info!(
                    "Reconnecting in {}ms (attempt {}/{})",
                    delay.as_millis(),
                    attempt,
                    self.options.reconnect.max_attempts
                );
                self.retry_at = Some(Instant::now() + delay);
            }
            None => {
                error!(
                    "Giving up after {} reconnect attempts",
                    self.options.reconnect.max_attempts
                );
                self.router.emit_connection_error(
                    ConnectionErrorKind::ReconnectExhausted,
                    format!(
                        "gave up after {} reconnect attempts",
                        self.options.reconnect.max_attempts
                    ),
                );
            }
        }
    }

    /// Connection listeners hear about every crossing of the Connected
    /// boundary, before the new state is published to watchers.
    fn set_state(&mut self, next: ConnectionState) {
        let was_connected = self.state == ConnectionState::Connected;
        let now_connected = next == ConnectionState::Connected;
        self.state = next;

        if was_connected != now_connected {
            info!("Connection status: {}", ConnectionStatus::from(now_connected));
            self.router.emit_connection_change(now_connected);
        }
        self.state_tx.send_replace(next);
    }

    fn transmit(&self, outbound: &Outbound) {
        let Some(transport) = &self.transport else {
            return;
        };
        match outbound.to_envelope() {
            Ok(envelope) => {
                if !transport.send(envelope) {
                    debug!("Transport closed before '{}' was sent", outbound.event_type());
                }
            }
            Err(e) => error!("Failed to encode '{}': {}", outbound.event_type(), e),
        }
    }

    /// Returns `true` if a transport was open.
    fn close_transport(&mut self) -> bool {
        match self.transport.take() {
            Some(handle) => {
                handle.close();
                true
            }
            None => false,
        }
    }
}

async fn next_transport_event(transport: &mut Option<TransportHandle>) -> TransportEvent {
    match transport {
        Some(handle) => handle
            .next_event()
            .await
            .unwrap_or_else(|| TransportEvent::Failed("transport task ended".to_string())),
        None => pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::ReconnectPolicy;
    use crate::options::TransportKind;
    use crate::transport::{Frame, TransportPeer};
    use credentials::{ExposeSecret, MemoryCredentialStore};
    use events::{ConnectionError, Envelope};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    use crate::error::unauthorized;

    #[derive(Debug, Clone, Copy)]
    enum Script {
        Accept,
        Refuse,
        Reject,
    }

    /// Connector whose handshakes follow a script; accepted peers are handed to the test.
    struct ScriptedConnector {
        script: Mutex<VecDeque<Script>>,
        tokens: Mutex<Vec<String>>,
        opened_at: Mutex<Vec<Instant>>,
        peers: mpsc::UnboundedSender<TransportPeer>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedConnector {
        fn new(script: &[Script]) -> (Arc<Self>, mpsc::UnboundedReceiver<TransportPeer>) {
            Self::build(script, None)
        }

        fn gated(
            script: &[Script],
            gate: Arc<Notify>,
        ) -> (Arc<Self>, mpsc::UnboundedReceiver<TransportPeer>) {
            Self::build(script, Some(gate))
        }

        fn build(
            script: &[Script],
            gate: Option<Arc<Notify>>,
        ) -> (Arc<Self>, mpsc::UnboundedReceiver<TransportPeer>) {
            let (peers, peers_rx) = mpsc::unbounded_channel();
            let connector = Arc::new(Self {
                script: Mutex::new(script.iter().copied().collect()),
                tokens: Mutex::new(Vec::new()),
                opened_at: Mutex::new(Vec::new()),
                peers,
                gate,
            });
            (connector, peers_rx)
        }

        fn tokens(&self) -> Vec<String> {
            self.tokens.lock().unwrap().clone()
        }

        fn opened_at(&self) -> Vec<Instant> {
            self.opened_at.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Connector for ScriptedConnector {
        async fn open(&self, _: &Url, token: &SecretString) -> Result<TransportHandle, Error> {
            self.tokens
                .lock()
                .unwrap()
                .push(token.expose_secret().clone());
            self.opened_at.lock().unwrap().push(Instant::now());

            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            let step = self.script.lock().unwrap().pop_front().unwrap_or(Script::Refuse);
            match step {
                Script::Accept => {
                    let (handle, peer) = TransportHandle::pair(TransportKind::WebSocket);
                    self.peers.send(peer).unwrap();
                    Ok(handle)
                }
                Script::Refuse => Err(transport_error(
                    TransportErrorKind::Connect,
                    "connection refused",
                )),
                Script::Reject => Err(unauthorized("401 Unauthorized")),
            }
        }
    }

    struct Recorded {
        changes: Arc<Mutex<Vec<bool>>>,
        errors: Arc<Mutex<Vec<ConnectionError>>>,
        _subscriptions: Vec<crate::listener::Subscription>,
    }

    impl Recorded {
        fn changes(&self) -> Vec<bool> {
            self.changes.lock().unwrap().clone()
        }

        fn error_kinds(&self) -> Vec<ConnectionErrorKind> {
            self.errors.lock().unwrap().iter().map(|e| e.kind).collect()
        }
    }

    fn record(client: &SyncClient) -> Recorded {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let change_sink = changes.clone();
        let error_sink = errors.clone();
        let subscriptions = vec![
            client
                .events()
                .on_connection_change(move |connected| change_sink.lock().unwrap().push(*connected)),
            client
                .events()
                .on_connection_error(move |error| error_sink.lock().unwrap().push(error.clone())),
        ];
        Recorded {
            changes,
            errors,
            _subscriptions: subscriptions,
        }
    }

    fn client_with(
        credentials: Arc<MemoryCredentialStore>,
        connector: Arc<ScriptedConnector>,
    ) -> SyncClient {
        let options = SyncOptions::default()
            .with_reconnect(ReconnectPolicy::new(Duration::from_millis(1000), 5));
        SyncClient::with_connector(options, credentials, connector).unwrap()
    }

    /// Let the driver and handshake tasks run without moving the clock.
    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    fn sent_events(peer: &mut TransportPeer) -> Vec<String> {
        let mut events = Vec::new();
        while let Ok(frame) = peer.outbound.try_recv() {
            match frame {
                Frame::Envelope(envelope) => events.push(envelope.event),
                Frame::Close => events.push("<close>".to_string()),
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_notifies_listeners_once() {
        let (connector, mut peers) = ScriptedConnector::new(&[Script::Accept]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok-1")), connector.clone());
        let recorded = record(&client);

        client.connect();
        client.connect();
        settle().await;

        assert!(client.is_connected());
        assert_eq!(client.status(), ConnectionStatus::Online);
        assert_eq!(recorded.changes(), vec![true]);
        assert_eq!(connector.tokens(), vec!["tok-1".to_string()]);
        assert!(peers.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_update_rehandshakes_with_new_token() {
        let (connector, mut peers) = ScriptedConnector::new(&[Script::Accept, Script::Accept]);
        let credentials = Arc::new(MemoryCredentialStore::with_token("tok-1"));
        let client = client_with(credentials.clone(), connector.clone());
        let recorded = record(&client);

        client.connect();
        settle().await;
        let mut first = peers.try_recv().unwrap();

        client.update_credential("tok-2").unwrap();
        settle().await;

        assert_eq!(recorded.changes(), vec![true, false, true]);
        assert_eq!(connector.tokens(), vec!["tok-1".to_string(), "tok-2".to_string()]);
        assert_eq!(sent_events(&mut first), vec!["<close>".to_string()]);
        assert_eq!(credentials.snapshot().token.as_deref(), Some("tok-2"));
        assert!(client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_update_while_disconnected_only_stores() {
        let (connector, _peers) = ScriptedConnector::new(&[]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok-1")), connector.clone());

        client.update_credential("tok-2").unwrap();
        settle().await;

        assert!(connector.tokens().is_empty());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_then_gives_up() {
        let (connector, _peers) = ScriptedConnector::new(&[]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok")), connector.clone());
        let recorded = record(&client);

        client.connect();
        tokio::time::sleep(Duration::from_secs(120)).await;

        let opened = connector.opened_at();
        assert_eq!(opened.len(), 6);
        let gaps: Vec<u128> = opened
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect();
        for (gap, expected) in gaps.iter().zip([1000u128, 2000, 4000, 8000, 16000]) {
            assert!(
                gap.abs_diff(expected) <= 50,
                "gap {}ms, expected about {}ms",
                gap,
                expected
            );
        }

        let kinds = recorded.error_kinds();
        assert_eq!(kinds.last(), Some(&ConnectionErrorKind::ReconnectExhausted));
        assert_eq!(
            kinds
                .iter()
                .filter(|kind| **kind == ConnectionErrorKind::Transport)
                .count(),
            6
        );
        assert!(recorded.changes().is_empty());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rooms_are_rejoined_after_server_disconnect() {
        let (connector, mut peers) = ScriptedConnector::new(&[Script::Accept, Script::Accept]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok")), connector.clone());
        let recorded = record(&client);

        client.connect();
        settle().await;
        let mut first = peers.try_recv().unwrap();

        client.join_project("p-1");
        client.join_workspace("w-1");
        settle().await;
        assert_eq!(
            sent_events(&mut first),
            vec!["join_project".to_string(), "join_workspace".to_string()]
        );

        assert!(first.deliver(Envelope::new(
            "disconnect",
            json!({ "reason": "io server disconnect" })
        )));
        settle().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        let mut second = peers.try_recv().unwrap();
        assert_eq!(
            sent_events(&mut second),
            vec!["join_workspace".to_string(), "join_project".to_string()]
        );
        assert_eq!(recorded.changes(), vec![true, false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_intents_while_disconnected() {
        let (connector, mut peers) = ScriptedConnector::new(&[Script::Accept]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok")), connector);

        client.join_project("p-7");
        client.join_project("p-8");
        client.leave_project("p-8");
        client.send_task_update("t-1", "name", json!({ "name": "Draft" }));
        client.send_typing_indicator("task", "t-1", "notes", true);
        assert_eq!(client.joined_rooms().await, vec![Room::Project("p-7".to_string())]);

        client.connect();
        settle().await;

        let mut peer = peers.try_recv().unwrap();
        assert_eq!(sent_events(&mut peer), vec!["join_project".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_credential_reports_error_without_handshake() {
        let (connector, _peers) = ScriptedConnector::new(&[Script::Accept]);
        let client = client_with(Arc::new(MemoryCredentialStore::new()), connector.clone());
        let recorded = record(&client);

        client.connect();
        settle().await;

        assert_eq!(
            recorded.error_kinds(),
            vec![ConnectionErrorKind::MissingCredential]
        );
        assert!(connector.tokens().is_empty());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_credential_is_not_retried() {
        let (connector, _peers) = ScriptedConnector::new(&[Script::Reject]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("expired")), connector.clone());
        let recorded = record(&client);

        client.connect();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(recorded.error_kinds(), vec![ConnectionErrorKind::Unauthorized]);
        assert_eq!(connector.tokens().len(), 1);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_discards_inflight_handshake() {
        let gate = Arc::new(Notify::new());
        let (connector, mut peers) = ScriptedConnector::gated(&[Script::Accept], gate.clone());
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok")), connector.clone());
        let recorded = record(&client);

        client.connect();
        settle().await;
        assert_eq!(client.state(), ConnectionState::Connecting);

        client.disconnect();
        settle().await;
        gate.notify_one();
        settle().await;

        let mut late = peers.try_recv().unwrap();
        assert_eq!(sent_events(&mut late), vec!["<close>".to_string()]);
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(recorded.changes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_typing_reaches_presence() {
        let (connector, mut peers) = ScriptedConnector::new(&[Script::Accept]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok")), connector);

        client.connect();
        settle().await;
        let peer = peers.try_recv().unwrap();

        peer.deliver(Envelope::new(
            "typing_indicator",
            json!({
                "target_type": "task",
                "target_gid": "t-1",
                "field": "notes",
                "is_typing": true,
                "user": { "gid": "u-2", "name": "Bruno" },
                "timestamp": "2024-05-01T10:15:30"
            }),
        ));
        settle().await;

        assert_eq!(
            client.presence().summary("t-1", "notes", Some("u-1")).as_deref(),
            Some("Bruno is typing")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_close_does_not_reconnect() {
        let (connector, mut peers) = ScriptedConnector::new(&[Script::Accept, Script::Accept]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok")), connector.clone());

        client.connect();
        settle().await;
        let peer = peers.try_recv().unwrap();
        peer.closed(DisconnectReason::client("io client disconnect"));
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(connector.tokens().len(), 1);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_reconnect() {
        let (connector, _peers) = ScriptedConnector::new(&[]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok")), connector.clone());

        client.connect();
        settle().await;
        assert_eq!(connector.tokens().len(), 1);

        client.disconnect();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(connector.tokens().len(), 1);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_connect_after_exhaustion_restores_budget() {
        let (connector, _peers) = ScriptedConnector::new(&[]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok")), connector.clone());
        let recorded = record(&client);

        client.connect();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(connector.tokens().len(), 6);

        client.connect();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(connector.tokens().len(), 12);
        let exhausted = recorded
            .error_kinds()
            .into_iter()
            .filter(|kind| *kind == ConnectionErrorKind::ReconnectExhausted)
            .count();
        assert_eq!(exhausted, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_transport_reconnects() {
        let (connector, mut peers) = ScriptedConnector::new(&[Script::Accept, Script::Accept]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok")), connector.clone());
        let recorded = record(&client);

        client.connect();
        settle().await;
        drop(peers.try_recv().unwrap());
        settle().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(recorded.changes(), vec![true, false, true]);
        assert_eq!(connector.tokens().len(), 2);
        assert_eq!(recorded.error_kinds(), vec![ConnectionErrorKind::Transport]);
        assert!(client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_reconnects() {
        let (connector, mut peers) = ScriptedConnector::new(&[Script::Accept, Script::Accept]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok")), connector.clone());

        client.connect();
        settle().await;
        let peer = peers.try_recv().unwrap();
        peer.fail("connection reset");
        settle().await;

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(connector.tokens().len(), 2);
        assert!(client.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_waits_for_disconnect_and_sends_close_frame() {
        let (connector, mut peers) = ScriptedConnector::new(&[Script::Accept]);
        let client = client_with(Arc::new(MemoryCredentialStore::with_token("tok")), connector);
        let recorded = record(&client);

        client.connect();
        settle().await;
        let mut peer = peers.try_recv().unwrap();

        client.close().await;

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(recorded.changes(), vec![true, false]);
        assert_eq!(sent_events(&mut peer), vec!["<close>".to_string()]);
    }
}
