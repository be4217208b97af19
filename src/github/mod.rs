//! GitHub plumbing: webhook signatures, app authentication, the REST client
//! used for write-back actions, and the OAuth user flow.

pub mod auth;
pub mod client;
pub mod oauth;
pub mod signature;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use types::{IssueSummary, PullRequest, PullRequestFile, RepoRef};

pub const API_VERSION: &str = "2022-11-28";
pub const ACCEPT: &str = "application/vnd.github+json";

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("GitHub returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl GitHubError {
    /// Drain a non-success response into a `Status` error.
    pub(crate) async fn from_response(resp: reqwest::Response) -> Self {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        GitHubError::Status { status, body }
    }
}

/// Shared HTTP client for GitHub and the suggestion backend.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("hubrelay/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// GitHub capabilities the event handlers rely on.
///
/// Write operations are fire-and-forget: they log failures and never return
/// an error, except `link_issue_to_pr`, whose result drives which follow-up
/// comment is posted.
#[async_trait]
pub trait IssueActions: Send + Sync {
    /// Comments endpoint for an issue or pull request number.
    fn comments_url(&self, repo: &RepoRef, number: u64) -> String;

    async fn comment_on(&self, comments_url: &str, body: &str, token: &str);

    async fn set_labels(&self, repo: &RepoRef, issue: u64, labels: &[String], token: &str);

    async fn close_issue(&self, repo: &RepoRef, issue: u64, token: &str);

    async fn reopen_issue(&self, repo: &RepoRef, issue: u64, token: &str);

    async fn link_issue_to_pr(&self, repo: &RepoRef, pull: u64, issue: u64, token: &str) -> bool;

    async fn list_repo_labels(&self, repo: &RepoRef, token: &str) -> Result<Vec<String>, GitHubError>;

    async fn get_pull_request(
        &self,
        repo: &RepoRef,
        pull: u64,
        token: &str,
    ) -> Result<PullRequest, GitHubError>;

    async fn get_pull_request_files(
        &self,
        repo: &RepoRef,
        pull: u64,
        token: &str,
    ) -> Result<Vec<PullRequestFile>, GitHubError>;

    /// Open issues created by `author`, pull requests excluded.
    async fn list_open_issues_by_author(
        &self,
        repo: &RepoRef,
        author: &str,
        token: &str,
    ) -> Result<Vec<IssueSummary>, GitHubError>;
}
