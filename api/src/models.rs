//! Records returned by the backend and the parameter types sent to it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub gid: String,
    #[serde(default)]
    pub resource_type: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub gid: String,
    #[serde(default)]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub is_organization: bool,
    #[serde(default)]
    pub email_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub gid: String,
    #[serde(default)]
    pub resource_type: String,
    pub name: String,
    pub owner_gid: Option<String>,
    pub team_gid: Option<String>,
    pub workspace_gid: String,
    #[serde(default)]
    pub default_view: String,
    pub color: Option<String>,
    pub privacy_setting: Option<String>,
    pub due_on: Option<String>,
    pub start_on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub gid: String,
    #[serde(default)]
    pub resource_type: String,
    pub name: String,
    pub notes: Option<String>,
    pub assignee_gid: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub due_on: Option<String>,
    pub start_on: Option<String>,
    pub parent_gid: Option<String>,
    pub workspace_gid: String,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub completed_at: Option<String>,
    pub resource_subtype: Option<String>,
}

/// Response body of login and registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkspaceParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_organization: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_domains: Option<Vec<String>>,
}

/// Fields for creating or updating a project; unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_gid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_gid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_setting: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_on: Option<String>,
}

/// Fields for creating or updating a task; unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_gid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_gid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_gid: Option<String>,
    /// Projects the task is added to on creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_gids: Option<Vec<String>>,
}

/// Query filters for listing tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_gid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_gid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_gid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_dependencies: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_assignee: Option<bool>,
}

impl TaskFilter {
    pub fn for_project(project_gid: impl Into<String>) -> Self {
        Self {
            project_gid: Some(project_gid.into()),
            ..Default::default()
        }
    }
}
