//! Task endpoints, including project membership of a task.

use serde::Serialize;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{Task, TaskFilter, TaskParams};

#[derive(Serialize)]
struct AddToProject<'a> {
    project_gid: &'a str,
}

impl ApiClient {
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, Error> {
        self.get_with_query("/tasks", filter).await
    }

    pub async fn project_tasks(&self, project_gid: &str) -> Result<Vec<Task>, Error> {
        self.list_tasks(&TaskFilter::for_project(project_gid)).await
    }

    pub async fn create_task(&self, params: &TaskParams) -> Result<Task, Error> {
        self.post("/tasks", params).await
    }

    pub async fn get_task(&self, task_gid: &str) -> Result<Task, Error> {
        self.get(&format!("/tasks/{}", task_gid)).await
    }

    pub async fn update_task(&self, task_gid: &str, params: &TaskParams) -> Result<Task, Error> {
        self.put(&format!("/tasks/{}", task_gid), params).await
    }

    pub async fn delete_task(&self, task_gid: &str) -> Result<(), Error> {
        self.delete(&format!("/tasks/{}", task_gid)).await
    }

    pub async fn add_task_to_project(&self, task_gid: &str, project_gid: &str) -> Result<(), Error> {
        self.post_empty(
            &format!("/tasks/{}/projects", task_gid),
            &AddToProject { project_gid },
        )
        .await
    }

    pub async fn remove_task_from_project(
        &self,
        task_gid: &str,
        project_gid: &str,
    ) -> Result<(), Error> {
        self.delete(&format!("/tasks/{}/projects/{}", task_gid, project_gid))
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{ApiClient, ApiClientConfig};
    use crate::models::{TaskFilter, TaskParams};
    use credentials::MemoryCredentialStore;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::Arc;

    fn task_json(gid: &str) -> serde_json::Value {
        json!({
            "gid": gid,
            "resource_type": "task",
            "name": "Write release notes",
            "notes": "Draft in the shared doc",
            "assignee_gid": "u-2",
            "completed": false,
            "due_on": "2024-06-01",
            "start_on": null,
            "parent_gid": null,
            "workspace_gid": "w-1",
            "created_at": "2024-05-20T10:00:00",
            "modified_at": "2024-05-21T09:30:00",
            "completed_at": null,
            "resource_subtype": "default_task"
        })
    }

    fn client(server: &Server) -> ApiClient {
        ApiClient::new(
            ApiClientConfig::default().with_base_url(server.url()),
            Arc::new(MemoryCredentialStore::with_token("jwt")),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_tasks_sends_filters() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/tasks")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("project_gid".into(), "p-1".into()),
                Matcher::UrlEncoded("completed".into(), "false".into()),
            ]))
            .with_body(json!([task_json("t-1")]).to_string())
            .create_async()
            .await;

        let filter = TaskFilter {
            completed: Some(false),
            ..TaskFilter::for_project("p-1")
        };
        let tasks = client(&server).list_tasks(&filter).await.unwrap();

        mock.assert_async().await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].assignee_gid.as_deref(), Some("u-2"));
        assert!(!tasks[0].completed);
    }

    #[tokio::test]
    async fn test_create_task_with_projects() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/tasks")
            .match_body(Matcher::Json(json!({
                "name": "Write release notes",
                "workspace_gid": "w-1",
                "project_gids": ["p-1"]
            })))
            .with_status(201)
            .with_body(task_json("t-9").to_string())
            .create_async()
            .await;

        let task = client(&server)
            .create_task(&TaskParams {
                name: Some("Write release notes".to_string()),
                workspace_gid: Some("w-1".to_string()),
                project_gids: Some(vec!["p-1".to_string()]),
                ..Default::default()
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(task.gid, "t-9");
    }

    #[tokio::test]
    async fn test_task_project_membership() {
        let mut server = Server::new_async().await;
        let add = server
            .mock("POST", "/tasks/t-1/projects")
            .match_body(Matcher::Json(json!({ "project_gid": "p-2" })))
            .with_status(200)
            .with_body(r#"{"message": "ok"}"#)
            .create_async()
            .await;
        let remove = server
            .mock("DELETE", "/tasks/t-1/projects/p-2")
            .with_status(204)
            .create_async()
            .await;

        let client = client(&server);
        client.add_task_to_project("t-1", "p-2").await.unwrap();
        client.remove_task_from_project("t-1", "p-2").await.unwrap();

        add.assert_async().await;
        remove.assert_async().await;
    }
}
