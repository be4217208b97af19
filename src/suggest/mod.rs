//! Language-model suggestions: labels for new issues, and a review plus
//! related-issue guess for new pull requests.

pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

use crate::github::types::{IssueSummary, PullRequest, PullRequestFile};

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("suggestion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("suggestion backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("suggestion response did not match the expected schema: {0}")]
    Schema(String),
}

#[derive(Debug, Clone)]
pub struct IssueDraft {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub pull_request: PullRequest,
    pub files: Vec<PullRequestFile>,
    /// Open issues of the PR author, candidates for linking.
    pub open_issues: Vec<IssueSummary>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullRequestReview {
    pub related_issue: Option<u64>,
    pub review: Option<String>,
}

#[async_trait]
pub trait SuggestionSource: Send + Sync {
    async fn suggest_labels(
        &self,
        issue: &IssueDraft,
        existing_labels: &[String],
    ) -> Result<Vec<String>, SuggestionError>;

    async fn review_pull_request(
        &self,
        request: &ReviewRequest,
    ) -> Result<PullRequestReview, SuggestionError>;
}

/// Used when no language-model backend is configured.
pub struct NoSuggestions;

#[async_trait]
impl SuggestionSource for NoSuggestions {
    async fn suggest_labels(
        &self,
        _issue: &IssueDraft,
        _existing_labels: &[String],
    ) -> Result<Vec<String>, SuggestionError> {
        Ok(Vec::new())
    }

    async fn review_pull_request(
        &self,
        _request: &ReviewRequest,
    ) -> Result<PullRequestReview, SuggestionError> {
        Ok(PullRequestReview::default())
    }
}
