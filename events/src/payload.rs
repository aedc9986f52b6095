//! Payload records carried by inbound realtime events.
//!
//! Field names match the wire format emitted by the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::timestamp;

/// Field a typing indicator refers to when the server omits it.
pub const DEFAULT_TYPING_FIELD: &str = "notes";

fn default_typing_field() -> String {
    DEFAULT_TYPING_FIELD.to_string()
}

/// Reference to the user whose action produced an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub gid: String,
    pub name: String,
}

/// Live edit broadcast by a collaborator through the socket (`task_updated`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub task_gid: String,
    /// e.g. `name_change`, `status_change`, `assignment_change`
    pub update_type: String,
    #[serde(default)]
    pub update_data: Value,
    pub updated_by: Actor,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Change committed to a task, broadcast by the server after a REST mutation (`task_changed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskChange {
    pub task_gid: String,
    pub change_type: String,
    #[serde(default)]
    pub change_data: Value,
    /// Full task record after the change.
    #[serde(default)]
    pub task_data: Value,
    pub changed_by: Actor,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Change committed to a project (`project_changed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectChange {
    pub project_gid: String,
    pub change_type: String,
    #[serde(default)]
    pub change_data: Value,
    /// Full project record after the change.
    #[serde(default)]
    pub project_data: Value,
    pub changed_by: Actor,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// A collaborator started or stopped typing on a field of a task or project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingIndicator {
    /// `task` or `project`
    pub target_type: String,
    pub target_gid: String,
    #[serde(default = "default_typing_field")]
    pub field: String,
    #[serde(default)]
    pub is_typing: bool,
    pub user: Actor,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Another user entered or left a project room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomPresence {
    pub user_gid: String,
    pub user_name: String,
    pub project_gid: String,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl RoomPresence {
    pub fn actor(&self) -> Actor {
        Actor {
            gid: self.user_gid.clone(),
            name: self.user_name.clone(),
        }
    }
}

/// Acknowledgement sent by the server once the handshake token was accepted (`connected`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handshake {
    #[serde(default)]
    pub message: String,
    /// The authenticated user record as the server sees it.
    #[serde(default)]
    pub user: Value,
}

/// Error reported by the server for a previously sent event (`error`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    #[serde(default)]
    pub message: String,
}

/// Kinds of connection failures surfaced to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionErrorKind {
    /// `connect` was called without a stored credential.
    MissingCredential,
    /// The server rejected the credential during the handshake.
    Unauthorized,
    /// The transport failed while connecting or dropped unexpectedly.
    Transport,
    /// Every scheduled reconnection attempt failed.
    ReconnectExhausted,
    /// The server sent an `error` event.
    Server,
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ConnectionErrorKind::MissingCredential => "missing credential",
            ConnectionErrorKind::Unauthorized => "unauthorized",
            ConnectionErrorKind::Transport => "transport error",
            ConnectionErrorKind::ReconnectExhausted => "reconnect attempts exhausted",
            ConnectionErrorKind::Server => "server error",
        };
        write!(f, "{name}")
    }
}

/// Connection failure delivered to `ConnectionError` subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    /// Whether automatic reconnection may still recover from this error.
    pub recoverable: bool,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            recoverable: matches!(kind, ConnectionErrorKind::Transport),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
