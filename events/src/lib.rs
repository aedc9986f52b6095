//! Event types shared by the Taskboard realtime client.
//!
//! This crate defines every event that travels over the realtime connection,
//! in both directions, without depending on any transport or runtime.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum of the business notifications a client can receive
//!   (task and project changes, typing indicators, room presence, connection errors)
//! - **EventCategory**: The category tag a subscriber registers for
//! - **Envelope**: The `{"event": ..., "data": ...}` frame used on the wire
//! - **Outbound**: The named events a client sends to the server
//!
//! Entity snapshots (`task_data`, `project_data`, update payloads) are carried as
//! `serde_json::Value` so this crate stays independent of the REST record types.

use chrono::{DateTime, Utc};
use std::fmt;

pub mod payload;
pub mod timestamp;
pub mod wire;

pub use payload::{
    Actor, ConnectionError, ConnectionErrorKind, Handshake, ProjectChange, RoomPresence,
    ServerError, TaskChange, TaskUpdate, TypingIndicator, DEFAULT_TYPING_FIELD,
};
pub use wire::{Envelope, EventType, Outbound};

/// Domain events delivered to subscribers once an inbound frame has been classified.
///
/// Events are immutable once constructed and are never persisted by the client:
/// ownership ends when the event has been dispatched to every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A collaborator pushed a live edit for a task (`task_updated`).
    TaskUpdated(TaskUpdate),
    /// The server committed a change to a task through the REST layer (`task_changed`).
    TaskChanged(TaskChange),
    /// The server committed a change to a project (`project_changed`).
    ProjectChanged(ProjectChange),
    /// A collaborator started or stopped typing on a field (`typing_indicator`).
    TypingIndicator(TypingIndicator),
    /// Another user entered a project room (`user_joined_project`).
    UserJoinedRoom(RoomPresence),
    /// Another user left a project room (`user_left_project`).
    UserLeftRoom(RoomPresence),
    /// The connection failed or the server reported an error.
    ConnectionError(ConnectionError),
}

impl DomainEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            DomainEvent::TaskUpdated(_) => EventCategory::TaskUpdated,
            DomainEvent::TaskChanged(_) => EventCategory::TaskChanged,
            DomainEvent::ProjectChanged(_) => EventCategory::ProjectChanged,
            DomainEvent::TypingIndicator(_) => EventCategory::TypingIndicator,
            DomainEvent::UserJoinedRoom(_) => EventCategory::UserJoinedRoom,
            DomainEvent::UserLeftRoom(_) => EventCategory::UserLeftRoom,
            DomainEvent::ConnectionError(_) => EventCategory::ConnectionError,
        }
    }

    /// The user whose action produced this event. Connection errors have no actor.
    pub fn actor(&self) -> Option<Actor> {
        match self {
            DomainEvent::TaskUpdated(update) => Some(update.updated_by.clone()),
            DomainEvent::TaskChanged(change) => Some(change.changed_by.clone()),
            DomainEvent::ProjectChanged(change) => Some(change.changed_by.clone()),
            DomainEvent::TypingIndicator(indicator) => Some(indicator.user.clone()),
            DomainEvent::UserJoinedRoom(presence) | DomainEvent::UserLeftRoom(presence) => {
                Some(presence.actor())
            }
            DomainEvent::ConnectionError(_) => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::TaskUpdated(update) => update.timestamp,
            DomainEvent::TaskChanged(change) => change.timestamp,
            DomainEvent::ProjectChanged(change) => change.timestamp,
            DomainEvent::TypingIndicator(indicator) => indicator.timestamp,
            DomainEvent::UserJoinedRoom(presence) | DomainEvent::UserLeftRoom(presence) => {
                presence.timestamp
            }
            DomainEvent::ConnectionError(error) => error.timestamp,
        }
    }
}

/// Category tag used to register subscribers and to classify inbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    TaskUpdated,
    TaskChanged,
    ProjectChanged,
    TypingIndicator,
    UserJoinedRoom,
    UserLeftRoom,
    ConnectionError,
}

impl EventCategory {
    pub const ALL: [EventCategory; 7] = [
        EventCategory::TaskUpdated,
        EventCategory::TaskChanged,
        EventCategory::ProjectChanged,
        EventCategory::TypingIndicator,
        EventCategory::UserJoinedRoom,
        EventCategory::UserLeftRoom,
        EventCategory::ConnectionError,
    ];

    /// Wire name of the inbound event carrying this category.
    pub fn event_name(&self) -> &'static str {
        match self {
            EventCategory::TaskUpdated => "task_updated",
            EventCategory::TaskChanged => "task_changed",
            EventCategory::ProjectChanged => "project_changed",
            EventCategory::TypingIndicator => "typing_indicator",
            EventCategory::UserJoinedRoom => "user_joined_project",
            EventCategory::UserLeftRoom => "user_left_project",
            EventCategory::ConnectionError => "connect_error",
        }
    }

    /// Looks up the category for an inbound wire name.
    pub fn from_event_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.event_name() == name)
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.event_name())
    }
}
