//! Typed REST client for the Taskboard backend.
//!
//! All resources live under the `/api` base path. Every request carries the
//! bearer credential read fresh from the shared [`credentials::CredentialProvider`];
//! a `401 Unauthorized` anywhere clears the credential and fires the configured
//! unauthorized hook, which is how the application returns the user to login.
//!
//! # Modules
//!
//! - `client`: `ApiClient` with the generic get/post/put/delete plumbing
//! - `auth`: login, registration and the current user
//! - `workspaces`, `projects`, `tasks`: resource endpoints
//! - `models`: record types returned by the backend

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod projects;
pub mod tasks;
pub mod workspaces;

pub use client::{ApiClient, ApiClientConfig};
pub use error::{Error, ErrorKind};
pub use models::{
    AuthSession, Project, ProjectParams, Task, TaskFilter, TaskParams, User, Workspace,
    WorkspaceParams,
};
