//! Project endpoints.

use serde::Serialize;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{Project, ProjectParams};

#[derive(Serialize)]
struct ProjectQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    workspace_gid: Option<&'a str>,
}

impl ApiClient {
    /// List projects, optionally restricted to one workspace.
    pub async fn list_projects(&self, workspace_gid: Option<&str>) -> Result<Vec<Project>, Error> {
        self.get_with_query("/projects", &ProjectQuery { workspace_gid })
            .await
    }

    pub async fn create_project(&self, params: &ProjectParams) -> Result<Project, Error> {
        self.post("/projects", params).await
    }

    pub async fn get_project(&self, project_gid: &str) -> Result<Project, Error> {
        self.get(&format!("/projects/{}", project_gid)).await
    }

    pub async fn update_project(
        &self,
        project_gid: &str,
        params: &ProjectParams,
    ) -> Result<Project, Error> {
        self.put(&format!("/projects/{}", project_gid), params).await
    }

    pub async fn delete_project(&self, project_gid: &str) -> Result<(), Error> {
        self.delete(&format!("/projects/{}", project_gid)).await
    }
}
