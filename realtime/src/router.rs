//! Inbound event classification and fan-out.

use events::{
    ConnectionError, ConnectionErrorKind, DomainEvent, Envelope, EventCategory, Handshake,
    ProjectChange, RoomPresence, ServerError, TaskChange, TaskUpdate, TypingIndicator,
};
use log::*;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::listener::{Listeners, Subscription};

/// Outcome of routing one inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Dispatched to the category's listeners; carries how many ran.
    Delivered(EventCategory, usize),
    /// The server acknowledged the handshake (`connected`).
    Handshake,
    /// The server asked the client to disconnect.
    Disconnect(String),
    /// A room acknowledgement (`joined_project`, `left_project`, `joined_workspace`).
    Acknowledged(String),
    /// Unknown event name or undecodable payload.
    Ignored,
}

/// Registry of typed subscribers, one [`Listeners`] per category.
///
/// Cloning is cheap and every clone shares the same registries.
#[derive(Debug, Clone)]
pub struct EventRouter {
    task_updated: Listeners<TaskUpdate>,
    task_changed: Listeners<TaskChange>,
    project_changed: Listeners<ProjectChange>,
    typing_indicator: Listeners<TypingIndicator>,
    user_joined_room: Listeners<RoomPresence>,
    user_left_room: Listeners<RoomPresence>,
    connection_error: Listeners<ConnectionError>,
    connection_change: Listeners<bool>,
    handshake: Listeners<Handshake>,
    any: Listeners<DomainEvent>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            task_updated: Listeners::new("task_updated"),
            task_changed: Listeners::new("task_changed"),
            project_changed: Listeners::new("project_changed"),
            typing_indicator: Listeners::new("typing_indicator"),
            user_joined_room: Listeners::new("user_joined_project"),
            user_left_room: Listeners::new("user_left_project"),
            connection_error: Listeners::new("connection_error"),
            connection_change: Listeners::new("connection_change"),
            handshake: Listeners::new("connected"),
            any: Listeners::new("any"),
        }
    }

    pub fn on_task_update(&self, f: impl Fn(&TaskUpdate) + Send + Sync + 'static) -> Subscription {
        self.task_updated.subscribe(f)
    }

    pub fn on_task_change(&self, f: impl Fn(&TaskChange) + Send + Sync + 'static) -> Subscription {
        self.task_changed.subscribe(f)
    }

    pub fn on_project_change(
        &self,
        f: impl Fn(&ProjectChange) + Send + Sync + 'static,
    ) -> Subscription {
        self.project_changed.subscribe(f)
    }

    pub fn on_typing_indicator(
        &self,
        f: impl Fn(&TypingIndicator) + Send + Sync + 'static,
    ) -> Subscription {
        self.typing_indicator.subscribe(f)
    }

    pub fn on_user_joined_room(
        &self,
        f: impl Fn(&RoomPresence) + Send + Sync + 'static,
    ) -> Subscription {
        self.user_joined_room.subscribe(f)
    }

    pub fn on_user_left_room(
        &self,
        f: impl Fn(&RoomPresence) + Send + Sync + 'static,
    ) -> Subscription {
        self.user_left_room.subscribe(f)
    }

    pub fn on_connection_error(
        &self,
        f: impl Fn(&ConnectionError) + Send + Sync + 'static,
    ) -> Subscription {
        self.connection_error.subscribe(f)
    }

    /// Called with `true` on entering Connected and `false` on leaving it.
    pub fn on_connection_change(&self, f: impl Fn(&bool) + Send + Sync + 'static) -> Subscription {
        self.connection_change.subscribe(f)
    }

    pub fn on_handshake(&self, f: impl Fn(&Handshake) + Send + Sync + 'static) -> Subscription {
        self.handshake.subscribe(f)
    }

    /// Every domain event, after its category's own listeners.
    pub fn on_event(&self, f: impl Fn(&DomainEvent) + Send + Sync + 'static) -> Subscription {
        self.any.subscribe(f)
    }

    /// Classify an inbound envelope and dispatch it.
    pub fn route(&self, envelope: &Envelope) -> Routed {
        match envelope.event.as_str() {
            "connected" => {
                let handshake: Handshake = match decode("connected", &envelope.data) {
                    Some(handshake) => handshake,
                    None => return Routed::Ignored,
                };
                info!("Server acknowledged connection: {}", handshake.message);
                self.handshake.emit(&handshake);
                Routed::Handshake
            }
            "disconnect" => {
                let reason = envelope
                    .data
                    .get("reason")
                    .and_then(Value::as_str)
                    .or_else(|| envelope.data.as_str())
                    .unwrap_or("server requested disconnect")
                    .to_string();
                Routed::Disconnect(reason)
            }
            "error" => {
                let message = error_message(&envelope.data);
                warn!("Server reported an error: {}", message);
                let error = ConnectionError::new(ConnectionErrorKind::Server, message);
                let delivered = self.dispatch(DomainEvent::ConnectionError(error));
                Routed::Delivered(EventCategory::ConnectionError, delivered)
            }
            ack @ ("joined_project" | "left_project" | "joined_workspace") => {
                debug!("Server acknowledged {}: {}", ack, envelope.data);
                Routed::Acknowledged(ack.to_string())
            }
            name => match EventCategory::from_event_name(name) {
                Some(category) => match self.decode_event(category, &envelope.data) {
                    Some(event) => Routed::Delivered(category, self.dispatch(event)),
                    None => Routed::Ignored,
                },
                None => {
                    debug!("Ignoring unknown event '{}'", name);
                    Routed::Ignored
                }
            },
        }
    }

    /// Deliver an already-typed event to its category and to `on_event` listeners.
    /// Returns how many category listeners ran.
    pub fn dispatch(&self, event: DomainEvent) -> usize {
        let delivered = match &event {
            DomainEvent::TaskUpdated(update) => self.task_updated.emit(update),
            DomainEvent::TaskChanged(change) => self.task_changed.emit(change),
            DomainEvent::ProjectChanged(change) => self.project_changed.emit(change),
            DomainEvent::TypingIndicator(indicator) => self.typing_indicator.emit(indicator),
            DomainEvent::UserJoinedRoom(presence) => {
                info!(
                    "{} joined project {}",
                    presence.user_name, presence.project_gid
                );
                self.user_joined_room.emit(presence)
            }
            DomainEvent::UserLeftRoom(presence) => {
                info!("{} left project {}", presence.user_name, presence.project_gid);
                self.user_left_room.emit(presence)
            }
            DomainEvent::ConnectionError(error) => self.connection_error.emit(error),
        };
        self.any.emit(&event);
        delivered
    }

    pub(crate) fn emit_connection_error(&self, kind: ConnectionErrorKind, message: impl Into<String>) {
        self.dispatch(DomainEvent::ConnectionError(ConnectionError::new(
            kind, message,
        )));
    }

    pub(crate) fn emit_connection_change(&self, connected: bool) {
        self.connection_change.emit(&connected);
    }

    fn decode_event(&self, category: EventCategory, data: &Value) -> Option<DomainEvent> {
        let name = category.event_name();
        let event = match category {
            EventCategory::TaskUpdated => DomainEvent::TaskUpdated(decode(name, data)?),
            EventCategory::TaskChanged => DomainEvent::TaskChanged(decode(name, data)?),
            EventCategory::ProjectChanged => DomainEvent::ProjectChanged(decode(name, data)?),
            EventCategory::TypingIndicator => DomainEvent::TypingIndicator(decode(name, data)?),
            EventCategory::UserJoinedRoom => DomainEvent::UserJoinedRoom(decode(name, data)?),
            EventCategory::UserLeftRoom => DomainEvent::UserLeftRoom(decode(name, data)?),
            EventCategory::ConnectionError => DomainEvent::ConnectionError(ConnectionError::new(
                ConnectionErrorKind::Transport,
                error_message(data),
            )),
        };
        Some(event)
    }
}

fn decode<T: DeserializeOwned>(name: &str, data: &Value) -> Option<T> {
    match T::deserialize(data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!("Dropping malformed '{}' payload: {}", name, e);
            None
        }
    }
}

fn error_message(data: &Value) -> String {
    match data {
        Value::String(message) => message.clone(),
        Value::Null => "unknown error".to_string(),
        other => serde_json::from_value::<ServerError>(other.clone())
            .ok()
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| other.to_string()),
    }
}
