//! Workspace endpoints.

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{Workspace, WorkspaceParams};

impl ApiClient {
    pub async fn list_workspaces(&self) -> Result<Vec<Workspace>, Error> {
        self.get("/workspaces").await
    }

    pub async fn create_workspace(&self, params: &WorkspaceParams) -> Result<Workspace, Error> {
        self.post("/workspaces", params).await
    }

    pub async fn get_workspace(&self, workspace_gid: &str) -> Result<Workspace, Error> {
        self.get(&format!("/workspaces/{}", workspace_gid)).await
    }
}
