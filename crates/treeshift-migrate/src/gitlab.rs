//! GitLab v4 REST implementation of [`RepositoryProvider`].

use crate::config::Endpoint;
use crate::error::{MigrationError, Result};
use crate::provider::RepositoryProvider;
use crate::types::*;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

const PER_PAGE: usize = 100;

/// Client for one GitLab instance.
pub struct GitLabClient {
    client: Client,
    base_url: String,
    token: String,
}

impl GitLabClient {
    /// Create a client without contacting the instance.
    pub fn new(endpoint: &Endpoint) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("treeshift/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: endpoint.url.trim_end_matches('/').to_string(),
            token: endpoint.token.clone(),
        })
    }

    /// Create a client and check that its token is accepted.
    ///
    /// Any failure here is reported as an authentication failure.
    pub async fn connect(endpoint: &Endpoint) -> Result<(Self, User)> {
        let client = Self::new(endpoint)?;
        let user = client.current_user().await.map_err(|e| match e {
            MigrationError::AuthenticationFailed(msg) => MigrationError::AuthenticationFailed(msg),
            other => MigrationError::AuthenticationFailed(format!(
                "could not reach {}: {other}",
                client.base_url
            )),
        })?;
        debug!(url = %client.base_url, user = %user.username, "Connected");
        Ok((client, user))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(MigrationError::AuthenticationFailed(format!(
                "token rejected by {}",
                self.base_url
            ))),
            StatusCode::NOT_FOUND => Err(MigrationError::NotFound(what.to_string())),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                Err(MigrationError::ApiError(format!(
                    "GitLab API error on {what} ({status}): {body}"
                )))
            }
            _ => Ok(response),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.client.get(self.api_url(path)), path).await?;
        response
            .json()
            .await
            .map_err(|e| MigrationError::ApiError(e.to_string()))
    }

    async fn get_paginated<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let mut page = 1;

        loop {
            let paginated_path = if path.contains('?') {
                format!("{path}&page={page}&per_page={PER_PAGE}")
            } else {
                format!("{path}?page={page}&per_page={PER_PAGE}")
            };

            let items: Vec<T> = self.get(&paginated_path).await?;

            if items.is_empty() {
                break;
            }

            let count = items.len();
            all_items.extend(items);

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(all_items)
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .send(self.client.post(self.api_url(path)).json(body), path)
            .await?;
        response
            .json()
            .await
            .map_err(|e| MigrationError::ApiError(e.to_string()))
    }

    async fn post_discard<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<()> {
        self.send(self.client.post(self.api_url(path)).json(body), path)
            .await?;
        Ok(())
    }

    async fn put_discard<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<()> {
        self.send(self.client.put(self.api_url(path)).json(body), path)
            .await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.client.delete(self.api_url(path)), path).await?;
        Ok(())
    }

    async fn upload_avatar(&self, path: &str, filename: &str, image: Vec<u8>) -> Result<()> {
        let part = multipart::Part::bytes(image).file_name(filename.to_string());
        let form = multipart::Form::new().part("avatar", part);
        self.send(self.client.put(self.api_url(path)).multipart(form), path)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RepositoryProvider for GitLabClient {
    async fn current_user(&self) -> Result<User> {
        self.get("/user").await
    }

    async fn get_group(&self, group_id: u64) -> Result<Group> {
        self.get(&format!("/groups/{group_id}")).await
    }

    async fn list_subgroups(&self, group_id: u64) -> Result<Vec<Group>> {
        self.get_paginated(&format!("/groups/{group_id}/subgroups"))
            .await
    }

    async fn list_projects(&self, group_id: u64) -> Result<Vec<Project>> {
        self.get_paginated(&format!("/groups/{group_id}/projects?include_subgroups=false"))
            .await
    }

    async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        self.post("/groups", group).await
    }

    async fn set_group_avatar(&self, group_id: u64, filename: &str, image: Vec<u8>) -> Result<()> {
        self.upload_avatar(&format!("/groups/{group_id}"), filename, image)
            .await
    }

    async fn create_project(&self, project: &NewProject) -> Result<Project> {
        self.post("/projects", project).await
    }

    async fn delete_project(&self, project_id: u64) -> Result<()> {
        self.delete(&format!("/projects/{project_id}")).await
    }

    async fn set_project_avatar(
        &self,
        project_id: u64,
        filename: &str,
        image: Vec<u8>,
    ) -> Result<()> {
        self.upload_avatar(&format!("/projects/{project_id}"), filename, image)
            .await
    }

    async fn list_branches(&self, project_id: u64) -> Result<Vec<Branch>> {
        self.get_paginated(&format!("/projects/{project_id}/repository/branches"))
            .await
    }

    async fn list_labels(&self, project_id: u64) -> Result<Vec<Label>> {
        self.get_paginated(&format!("/projects/{project_id}/labels"))
            .await
    }

    async fn create_label(&self, project_id: u64, label: &Label) -> Result<()> {
        self.post_discard(&format!("/projects/{project_id}/labels"), label)
            .await
    }

    async fn list_variables(&self, project_id: u64) -> Result<Vec<Variable>> {
        self.get_paginated(&format!("/projects/{project_id}/variables"))
            .await
    }

    async fn create_variable(&self, project_id: u64, variable: &Variable) -> Result<()> {
        self.post_discard(&format!("/projects/{project_id}/variables"), variable)
            .await
    }

    async fn list_protected_branches(&self, project_id: u64) -> Result<Vec<ProtectedBranch>> {
        self.get_paginated(&format!("/projects/{project_id}/protected_branches"))
            .await
    }

    async fn create_protected_branch(
        &self,
        project_id: u64,
        rule: &NewProtectedBranch,
    ) -> Result<()> {
        self.post_discard(&format!("/projects/{project_id}/protected_branches"), rule)
            .await
    }

    async fn list_protected_tags(&self, project_id: u64) -> Result<Vec<ProtectedTag>> {
        self.get_paginated(&format!("/projects/{project_id}/protected_tags"))
            .await
    }

    async fn create_protected_tag(&self, project_id: u64, rule: &NewProtectedTag) -> Result<()> {
        self.post_discard(&format!("/projects/{project_id}/protected_tags"), rule)
            .await
    }

    async fn list_milestones(&self, project_id: u64) -> Result<Vec<Milestone>> {
        self.get_paginated(&format!("/projects/{project_id}/milestones"))
            .await
    }

    async fn create_milestone(
        &self,
        project_id: u64,
        milestone: &NewMilestone,
    ) -> Result<Milestone> {
        self.post(&format!("/projects/{project_id}/milestones"), milestone)
            .await
    }

    async fn list_issues(&self, project_id: u64) -> Result<Vec<Issue>> {
        self.get_paginated(&format!(
            "/projects/{project_id}/issues?scope=all&order_by=created_at&sort=asc"
        ))
        .await
    }

    async fn create_issue(&self, project_id: u64, issue: &NewIssue) -> Result<Issue> {
        self.post(&format!("/projects/{project_id}/issues"), issue)
            .await
    }

    async fn close_issue(&self, project_id: u64, issue_iid: u64) -> Result<()> {
        #[derive(Serialize)]
        struct StateEvent {
            state_event: &'static str,
        }

        self.put_discard(
            &format!("/projects/{project_id}/issues/{issue_iid}"),
            &StateEvent {
                state_event: "close",
            },
        )
        .await
    }

    async fn list_open_merge_requests(&self, project_id: u64) -> Result<Vec<MergeRequest>> {
        self.get_paginated(&format!(
            "/projects/{project_id}/merge_requests?state=opened&order_by=created_at&sort=asc"
        ))
        .await
    }

    async fn create_merge_request(
        &self,
        project_id: u64,
        merge_request: &NewMergeRequest,
    ) -> Result<MergeRequest> {
        self.post(
            &format!("/projects/{project_id}/merge_requests"),
            merge_request,
        )
        .await
    }

    async fn list_notes(&self, project_id: u64, target: NoteTarget) -> Result<Vec<Note>> {
        self.get_paginated(&format!(
            "{}?order_by=created_at&sort=asc",
            notes_path(project_id, target)
        ))
        .await
    }

    async fn create_note(&self, project_id: u64, target: NoteTarget, note: &NewNote) -> Result<()> {
        self.post_discard(&notes_path(project_id, target), note)
            .await
    }

    async fn list_wiki_pages(&self, project_id: u64) -> Result<Vec<WikiPage>> {
        self.get(&format!("/projects/{project_id}/wikis?with_content=1"))
            .await
    }

    async fn create_wiki_page(&self, project_id: u64, page: &NewWikiPage) -> Result<()> {
        self.post_discard(&format!("/projects/{project_id}/wikis"), page)
            .await
    }

    async fn list_pipelines(&self, project_id: u64) -> Result<Vec<Pipeline>> {
        self.get_paginated(&format!("/projects/{project_id}/pipelines"))
            .await
    }

    async fn delete_pipeline(&self, project_id: u64, pipeline_id: u64) -> Result<()> {
        self.delete(&format!("/projects/{project_id}/pipelines/{pipeline_id}"))
            .await
    }

    async fn download_avatar(&self, url: &str, session_cookie: &str) -> Result<Option<Vec<u8>>> {
        // The avatar endpoint ignores PRIVATE-TOKEN; only a browser session works.
        let response = self
            .client
            .get(url)
            .header("Cookie", format!("_gitlab_session={session_cookie}"))
            .send()
            .await
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;

        if response.status() != StatusCode::OK {
            debug!(url = %url, status = %response.status(), "Avatar download refused");
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MigrationError::NetworkError(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }
}

fn notes_path(project_id: u64, target: NoteTarget) -> String {
    match target {
        NoteTarget::Issue(iid) => format!("/projects/{project_id}/issues/{iid}/notes"),
        NoteTarget::MergeRequest(iid) => {
            format!("/projects/{project_id}/merge_requests/{iid}/notes")
        }
    }
}
