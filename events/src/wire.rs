use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Trait for getting the wire name of an event
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// A single named event as it travels over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Events a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum Outbound {
    #[serde(rename = "join_project")]
    JoinProject { project_gid: String },
    #[serde(rename = "leave_project")]
    LeaveProject { project_gid: String },
    #[serde(rename = "join_workspace")]
    JoinWorkspace { workspace_gid: String },
    #[serde(rename = "task_update")]
    TaskUpdate {
        task_gid: String,
        update_type: String,
        update_data: Value,
    },
    #[serde(rename = "typing_indicator")]
    TypingIndicator {
        target_type: String,
        target_gid: String,
        field: String,
        is_typing: bool,
    },
}

impl EventType for Outbound {
    fn event_type(&self) -> &'static str {
        match self {
            Outbound::JoinProject { .. } => "join_project",
            Outbound::LeaveProject { .. } => "leave_project",
            Outbound::JoinWorkspace { .. } => "join_workspace",
            Outbound::TaskUpdate { .. } => "task_update",
            Outbound::TypingIndicator { .. } => "typing_indicator",
        }
    }
}

impl Outbound {
    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        serde_json::to_value(self).and_then(serde_json::from_value)
    }
}
