//! REST client for the write-back actions and the handful of reads the event
//! handlers need. One attempt per call; failures are logged and reported.

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::json;
use tracing::{debug, info, warn};

use super::types::{
    ContentFile, IssueListItem, IssueSummary, Label, PullRequest, PullRequestFile, RepoRef,
};
use super::{GitHubError, IssueActions, ACCEPT, API_VERSION};
use crate::events::permissions::{PermissionList, PermissionSource, PERMISSIONS_PATH};

#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
}

impl GitHubClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    fn repo_url(&self, repo: &RepoRef, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, repo.owner, repo.name, tail
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
    ) -> Result<T, GitHubError> {
        let resp = self.request(Method::GET, url, token).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(GitHubError::from_response(resp).await);
        }
        resp.json::<T>()
            .await
            .map_err(|e| GitHubError::Decode(e.to_string()))
    }

    async fn set_issue_state(&self, repo: &RepoRef, issue: u64, state: &str, token: &str) {
        let url = self.repo_url(repo, &format!("issues/{}", issue));
        let result = self
            .request(Method::PATCH, &url, token)
            .json(&json!({ "state": state }))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status() == StatusCode::OK => {
                info!(repo = %repo, issue, state, "issue state updated");
            }
            Ok(resp) => {
                let err = GitHubError::from_response(resp).await;
                warn!(repo = %repo, issue, state, error = %err, "failed to update issue state");
            }
            Err(e) => {
                warn!(repo = %repo, issue, state, error = %e, "issue state request failed");
            }
        }
    }

    async fn try_link_issue(
        &self,
        repo: &RepoRef,
        pull: u64,
        issue: u64,
        token: &str,
    ) -> Result<(), GitHubError> {
        let url = self.repo_url(repo, &format!("pulls/{}", pull));
        let pr: PullRequest = self.get_json(&url, token).await?;

        let current = pr.body.unwrap_or_default();
        let reference = format!("Closes #{}", issue);
        if references_issue(&current, &reference) {
            debug!(repo = %repo, pull, issue, "issue already referenced by pull request");
            return Ok(());
        }

        let resp = self
            .request(Method::PATCH, &url, token)
            .json(&json!({ "body": format!("{}\n\n{}", current, reference) }))
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            return Err(GitHubError::from_response(resp).await);
        }
        Ok(())
    }
}

/// `Closes #1` must not match inside `Closes #12`.
fn references_issue(body: &str, reference: &str) -> bool {
    body.match_indices(reference).any(|(at, _)| {
        !body[at + reference.len()..]
            .starts_with(|c: char| c.is_ascii_digit())
    })
}

#[async_trait]
impl IssueActions for GitHubClient {
    fn comments_url(&self, repo: &RepoRef, number: u64) -> String {
        self.repo_url(repo, &format!("issues/{}/comments", number))
    }

    async fn comment_on(&self, comments_url: &str, body: &str, token: &str) {
        let result = self
            .request(Method::POST, comments_url, token)
            .json(&json!({ "body": body }))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status() == StatusCode::CREATED => {
                info!(url = comments_url, "comment posted");
            }
            Ok(resp) => {
                let err = GitHubError::from_response(resp).await;
                warn!(url = comments_url, error = %err, "failed to post comment");
            }
            Err(e) => warn!(url = comments_url, error = %e, "comment request failed"),
        }
    }

    async fn set_labels(&self, repo: &RepoRef, issue: u64, labels: &[String], token: &str) {
        let url = self.repo_url(repo, &format!("issues/{}/labels", issue));
        let result = self
            .request(Method::POST, &url, token)
            .json(&json!({ "labels": labels }))
            .send()
            .await;

        match result {
            Ok(resp) if matches!(resp.status(), StatusCode::OK | StatusCode::CREATED) => {
                info!(repo = %repo, issue, ?labels, "labels applied");
            }
            Ok(resp) => {
                let err = GitHubError::from_response(resp).await;
                warn!(repo = %repo, issue, error = %err, "failed to apply labels");
            }
            Err(e) => warn!(repo = %repo, issue, error = %e, "label request failed"),
        }
    }

    async fn close_issue(&self, repo: &RepoRef, issue: u64, token: &str) {
        self.set_issue_state(repo, issue, "closed", token).await;
    }

    async fn reopen_issue(&self, repo: &RepoRef, issue: u64, token: &str) {
        self.set_issue_state(repo, issue, "open", token).await;
    }

    async fn link_issue_to_pr(&self, repo: &RepoRef, pull: u64, issue: u64, token: &str) -> bool {
        match self.try_link_issue(repo, pull, issue, token).await {
            Ok(()) => {
                info!(repo = %repo, pull, issue, "issue linked to pull request");
                true
            }
            Err(e) => {
                warn!(repo = %repo, pull, issue, error = %e, "failed to link issue to pull request");
                false
            }
        }
    }

    async fn list_repo_labels(&self, repo: &RepoRef, token: &str) -> Result<Vec<String>, GitHubError> {
        let labels: Vec<Label> = self.get_json(&self.repo_url(repo, "labels"), token).await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    async fn get_pull_request(
        &self,
        repo: &RepoRef,
        pull: u64,
        token: &str,
    ) -> Result<PullRequest, GitHubError> {
        self.get_json(&self.repo_url(repo, &format!("pulls/{}", pull)), token)
            .await
    }

    async fn get_pull_request_files(
        &self,
        repo: &RepoRef,
        pull: u64,
        token: &str,
    ) -> Result<Vec<PullRequestFile>, GitHubError> {
        self.get_json(&self.repo_url(repo, &format!("pulls/{}/files", pull)), token)
            .await
    }

    async fn list_open_issues_by_author(
        &self,
        repo: &RepoRef,
        author: &str,
        token: &str,
    ) -> Result<Vec<IssueSummary>, GitHubError> {
        let resp = self
            .request(Method::GET, &self.repo_url(repo, "issues"), token)
            .query(&[("state", "open"), ("creator", author)])
            .send()
            .await?;
        if resp.status() != StatusCode::OK {
            return Err(GitHubError::from_response(resp).await);
        }

        let items: Vec<IssueListItem> = resp
            .json()
            .await
            .map_err(|e| GitHubError::Decode(e.to_string()))?;

        Ok(items
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(|i| IssueSummary {
                number: i.number,
                title: i.title,
            })
            .collect())
    }
}

#[async_trait]
impl PermissionSource for GitHubClient {
    async fn fetch_permissions(
        &self,
        repo: &RepoRef,
        token: &str,
    ) -> Result<PermissionList, GitHubError> {
        let url = self.repo_url(repo, &format!("contents/{}", PERMISSIONS_PATH));
        let file: ContentFile = self.get_json(&url, token).await?;

        if let Some(encoding) = file.encoding.as_deref() {
            if encoding != "base64" {
                return Err(GitHubError::Decode(format!(
                    "unsupported content encoding '{}'",
                    encoding
                )));
            }
        }

        // The contents API wraps base64 at 60 columns.
        let packed: String = file.content.split_whitespace().collect();
        let raw = base64::engine::general_purpose::STANDARD
            .decode(packed)
            .map_err(|e| GitHubError::Decode(format!("permissions file is not base64: {}", e)))?;

        PermissionList::from_json(&raw).map_err(|e| GitHubError::Decode(e.to_string()))
    }
}
