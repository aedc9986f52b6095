//! Realtime synchronization client for Taskboard.
//!
//! Keeps one authenticated, bidirectional connection to the realtime server and
//! turns what arrives on it into typed events for the rest of the application.
//!
//! # Architecture
//!
//! - **Single connection**: A [`SyncClient`] owns at most one transport at a
//!   time. A driver task serializes every state transition; callers only enqueue
//!   commands.
//! - **Transport negotiation**: WebSocket first, HTTP long-polling as fallback,
//!   in the order configured in [`SyncOptions`].
//! - **Exponential backoff**: Abnormal drops are retried after
//!   `base_delay * 2^(n-1)` up to [`ReconnectPolicy::max_attempts`]; a rejected
//!   credential is never retried.
//! - **Rooms**: Project and workspace rooms are remembered and re-joined after
//!   every successful handshake.
//! - **Typed fan-out**: The [`EventRouter`] decodes each inbound envelope and
//!   hands it to the listeners registered for its category.
//! - **Presence**: A [`PresenceAggregator`] tracks who is typing where and
//!   expires stale indicators on its own.
//!
//! # Connection Flow
//!
//! 1. `connect()` reads the current token from the [`credentials::CredentialProvider`]
//! 2. The driver opens a transport with the token as handshake credential
//! 3. On success, stored rooms are re-joined, then connection listeners see `true`
//! 4. Inbound envelopes are routed until the transport closes
//! 5. A server or network drop schedules a reconnect; a client close does not
//!
//! # Example
//!
//! ```rust,ignore
//! use credentials::MemoryCredentialStore;
//! use realtime::{SyncClient, SyncOptions};
//! use std::sync::Arc;
//!
//! let credentials = Arc::new(MemoryCredentialStore::with_token(token));
//! let client = SyncClient::new(SyncOptions::default(), credentials)?;
//! let _sub = client.events().on_task_change(|change| {
//!     println!("task {} {}", change.task_gid, change.change_type);
//! });
//! client.connect();
//! client.join_project("1201");
//! ```
//!
//! # Modules
//!
//! - `connection`: SyncClient handle and the driver task
//! - `router`: Inbound classification and typed listener registries
//! - `listener`: Generic listener registry with scoped subscriptions
//! - `presence`: Typing indicator aggregation and summaries
//! - `rooms`: Room membership intent and replay
//! - `transport`: WebSocket and long-polling transports

pub mod backoff;
pub mod connection;
pub mod error;
pub mod listener;
pub mod options;
pub mod presence;
pub mod rooms;
pub mod router;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use connection::{ConnectionState, ConnectionStatus, SyncClient};
pub use error::{ConfigErrorKind, Error, ErrorKind, TransportErrorKind};
pub use listener::{Listeners, Subscription};
pub use options::{parse_transports, SyncOptions, TransportKind};
pub use presence::{
    typing_summary, PresenceAggregator, PresenceChange, PresenceChangeKind, DEFAULT_TYPING_EXPIRY,
};
pub use rooms::{Room, RoomSet};
pub use router::{EventRouter, Routed};
pub use transport::{
    Connector, DisconnectKind, DisconnectReason, NegotiatingConnector, PollingConnector,
    TransportEvent, TransportHandle, WebSocketConnector,
};
