//! Recording fakes for the relay's capability traits.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use hubrelay::config::Config;
use hubrelay::events::permissions::{PermissionList, PermissionSource};
use hubrelay::events::router::EventRouter;
use hubrelay::github::auth::{InstallationAuth, TokenError};
use hubrelay::github::oauth::OAuthClient;
use hubrelay::github::types::{
    Account, Installation, IssueSummary, PullRequest, PullRequestFile, RepoRef,
};
use hubrelay::github::{signature, GitHubError, IssueActions};
use hubrelay::store::{MemoryUserTokenStore, UserTokenStore};
use hubrelay::suggest::{
    IssueDraft, PullRequestReview, ReviewRequest, SuggestionError, SuggestionSource,
};
use hubrelay::AppState;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";
pub const INSTALLATION_TOKEN: &str = "ghs_installation";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Comment { url: String, body: String, token: String },
    SetLabels { issue: u64, labels: Vec<String> },
    Close { issue: u64, token: String },
    Reopen { issue: u64, token: String },
    Link { pull: u64, issue: u64 },
}

pub struct RecordingActions {
    pub log: Mutex<Vec<Call>>,
    pub repo_labels: Vec<String>,
    pub open_issues: Vec<IssueSummary>,
    pub link_succeeds: bool,
    pub pull_request_missing: bool,
}

impl Default for RecordingActions {
    fn default() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            repo_labels: vec!["bug".into(), "enhancement".into()],
            open_issues: Vec::new(),
            link_succeeds: true,
            pull_request_missing: false,
        }
    }
}

impl RecordingActions {
    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl IssueActions for RecordingActions {
    fn comments_url(&self, repo: &RepoRef, number: u64) -> String {
        format!("https://api.github.test/repos/{}/issues/{}/comments", repo, number)
    }

    async fn comment_on(&self, comments_url: &str, body: &str, token: &str) {
        self.record(Call::Comment {
            url: comments_url.into(),
            body: body.into(),
            token: token.into(),
        });
    }

    async fn set_labels(&self, _repo: &RepoRef, issue: u64, labels: &[String], _token: &str) {
        self.record(Call::SetLabels {
            issue,
            labels: labels.to_vec(),
        });
    }

    async fn close_issue(&self, _repo: &RepoRef, issue: u64, token: &str) {
        self.record(Call::Close {
            issue,
            token: token.into(),
        });
    }

    async fn reopen_issue(&self, _repo: &RepoRef, issue: u64, token: &str) {
        self.record(Call::Reopen {
            issue,
            token: token.into(),
        });
    }

    async fn link_issue_to_pr(&self, _repo: &RepoRef, pull: u64, issue: u64, _token: &str) -> bool {
        self.record(Call::Link { pull, issue });
        self.link_succeeds
    }

    async fn list_repo_labels(&self, _repo: &RepoRef, _token: &str) -> Result<Vec<String>, GitHubError> {
        Ok(self.repo_labels.clone())
    }

    async fn get_pull_request(
        &self,
        _repo: &RepoRef,
        pull: u64,
        _token: &str,
    ) -> Result<PullRequest, GitHubError> {
        if self.pull_request_missing {
            return Err(GitHubError::Status {
                status: 404,
                body: "Not Found".into(),
            });
        }
        Ok(PullRequest {
            number: pull,
            title: "Fix crash on startup".into(),
            body: Some("Guards against a missing config file.".into()),
        })
    }

    async fn get_pull_request_files(
        &self,
        _repo: &RepoRef,
        _pull: u64,
        _token: &str,
    ) -> Result<Vec<PullRequestFile>, GitHubError> {
        Ok(vec![PullRequestFile {
            filename: "src/main.rs".into(),
            patch: Some("+ if !path.exists() { return; }".into()),
        }])
    }

    async fn list_open_issues_by_author(
        &self,
        _repo: &RepoRef,
        _author: &str,
        _token: &str,
    ) -> Result<Vec<IssueSummary>, GitHubError> {
        Ok(self.open_issues.clone())
    }
}

/// Allow-list served from memory; `None` simulates a missing file.
pub struct StaticPermissions {
    pub list: Option<PermissionList>,
    pub fetches: AtomicUsize,
}

impl StaticPermissions {
    pub fn allowing(users: &[&str]) -> Self {
        Self {
            list: Some(PermissionList::new(users.iter().copied())),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            list: None,
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PermissionSource for StaticPermissions {
    async fn fetch_permissions(
        &self,
        _repo: &RepoRef,
        _token: &str,
    ) -> Result<PermissionList, GitHubError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.list.clone().ok_or_else(|| GitHubError::Status {
            status: 404,
            body: "Not Found".into(),
        })
    }
}

#[derive(Default)]
pub struct FixedSuggestions {
    pub labels: Vec<String>,
    pub review: PullRequestReview,
    pub fail: bool,
    pub seen_requests: Mutex<Vec<ReviewRequest>>,
}

#[async_trait]
impl SuggestionSource for FixedSuggestions {
    async fn suggest_labels(
        &self,
        _issue: &IssueDraft,
        _existing_labels: &[String],
    ) -> Result<Vec<String>, SuggestionError> {
        if self.fail {
            return Err(SuggestionError::Schema("not a list".into()));
        }
        Ok(self.labels.clone())
    }

    async fn review_pull_request(
        &self,
        request: &ReviewRequest,
    ) -> Result<PullRequestReview, SuggestionError> {
        self.seen_requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(SuggestionError::Schema("not an object".into()));
        }
        Ok(self.review.clone())
    }
}

pub struct FakeAuth {
    pub fail: bool,
    pub installations: Vec<Installation>,
    pub token_requests: AtomicUsize,
}

impl Default for FakeAuth {
    fn default() -> Self {
        Self {
            fail: false,
            installations: vec![Installation {
                id: 7,
                account: Account {
                    login: "octo-org".into(),
                },
            }],
            token_requests: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InstallationAuth for FakeAuth {
    async fn installation_token(&self, _installation_id: u64) -> Result<String, TokenError> {
        self.token_requests.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TokenError::Exchange(GitHubError::Status {
                status: 401,
                body: "Bad credentials".into(),
            }));
        }
        Ok(INSTALLATION_TOKEN.into())
    }

    async fn list_installations(&self) -> Result<Vec<Installation>, TokenError> {
        if self.fail {
            return Err(TokenError::Exchange(GitHubError::Status {
                status: 401,
                body: "Bad credentials".into(),
            }));
        }
        Ok(self.installations.clone())
    }
}

pub fn test_config(oauth_base: &str) -> Config {
    Config {
        port: 5000,
        base_url: "http://localhost:5000".into(),
        app_id: 12345,
        private_key: include_str!("../fixtures/test_app_key.pem").into(),
        webhook_secret: WEBHOOK_SECRET.into(),
        client_id: "Iv1.test".into(),
        client_secret: "client-secret".into(),
        github_api_url: oauth_base.into(),
        github_oauth_url: oauth_base.into(),
        database_url: None,
        master_key: None,
        openai_api_key: None,
        openai_base_url: "http://localhost:1".into(),
        openai_model: "gpt-4o".into(),
    }
}

/// Handles to every fake behind an `AppState`.
pub struct Harness {
    pub state: Arc<AppState>,
    pub actions: Arc<RecordingActions>,
    pub permissions: Arc<StaticPermissions>,
    pub suggestions: Arc<FixedSuggestions>,
    pub auth: Arc<FakeAuth>,
    pub user_tokens: Arc<MemoryUserTokenStore>,
}

pub struct HarnessBuilder {
    pub actions: RecordingActions,
    pub permissions: StaticPermissions,
    pub suggestions: FixedSuggestions,
    pub auth: FakeAuth,
    pub oauth_base: String,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            actions: RecordingActions::default(),
            permissions: StaticPermissions::allowing(&["maintainer"]),
            suggestions: FixedSuggestions::default(),
            auth: FakeAuth::default(),
            oauth_base: "http://127.0.0.1:1".into(),
        }
    }
}

impl HarnessBuilder {
    pub fn build(self) -> Harness {
        let actions = Arc::new(self.actions);
        let permissions = Arc::new(self.permissions);
        let suggestions = Arc::new(self.suggestions);
        let auth = Arc::new(self.auth);
        let user_tokens = Arc::new(MemoryUserTokenStore::new());

        let events = EventRouter::new(
            actions.clone(),
            suggestions.clone(),
            permissions.clone(),
            user_tokens.clone(),
        );
        let config = test_config(&self.oauth_base);
        let oauth = OAuthClient::new(
            reqwest::Client::new(),
            &config.github_oauth_url,
            &config.github_api_url,
            &config.client_id,
            &config.client_secret,
        );

        let state = Arc::new(AppState {
            config,
            auth: auth.clone(),
            oauth,
            user_tokens: user_tokens.clone() as Arc<dyn UserTokenStore>,
            events,
        });

        Harness {
            state,
            actions,
            permissions,
            suggestions,
            auth,
            user_tokens,
        }
    }
}

pub fn signed(body: &[u8]) -> String {
    signature::sign(WEBHOOK_SECRET, body)
}
