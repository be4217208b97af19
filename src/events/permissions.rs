//! Allow-list enforcement for issue close/reopen.
//!
//! GitHub delivers `issues.closed` / `issues.reopened` after the transition
//! already happened, so an unauthorized transition cannot be blocked, only
//! reverted. The allow-list lives in the target repository and is fetched on
//! every check.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::github::types::RepoRef;
use crate::github::{GitHubError, IssueActions};
use crate::store::UserTokenStore;

/// Repository path of the allow-list file.
pub const PERMISSIONS_PATH: &str = ".github/permissions.json";

#[derive(Debug, Deserialize)]
struct PermissionsFile {
    #[serde(default)]
    users_allowed_to_close_issues: Vec<String>,
}

/// Users permitted to close or reopen issues, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionList {
    allowed_users: Vec<String>,
}

impl PermissionList {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed_users: Vec<String> = Vec::new();
        for user in users {
            let user = user.into();
            if !allowed_users.contains(&user) {
                allowed_users.push(user);
            }
        }
        Self { allowed_users }
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let file: PermissionsFile = serde_json::from_slice(raw)?;
        Ok(Self::new(file.users_allowed_to_close_issues))
    }

    pub fn allows(&self, username: &str) -> bool {
        self.allowed_users.iter().any(|u| u == username)
    }

    pub fn users(&self) -> &[String] {
        &self.allowed_users
    }
}

#[async_trait]
pub trait PermissionSource: Send + Sync {
    async fn fetch_permissions(
        &self,
        repo: &RepoRef,
        token: &str,
    ) -> Result<PermissionList, GitHubError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueTransition {
    Closed,
    Reopened,
}

impl IssueTransition {
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "closed" => Some(Self::Closed),
            "reopened" => Some(Self::Reopened),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssueStateChange {
    pub repo: RepoRef,
    pub issue: u64,
    pub actor: String,
    /// Sender is a bot account, such as this app reverting a transition.
    pub actor_is_bot: bool,
    pub transition: IssueTransition,
}

impl IssueStateChange {
    fn by_bot(&self) -> bool {
        self.actor_is_bot || self.actor.ends_with("[bot]")
    }
}

/// Whose credential performed the revert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertCredential {
    /// Personal token of this allow-listed user.
    User(String),
    Installation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Reverted(RevertCredential),
    /// Made by a bot; reverting would fight the app's own reverts.
    SkippedBot,
    /// Allow-list unavailable; nothing was done.
    Aborted,
}

pub struct PermissionGate {
    source: Arc<dyn PermissionSource>,
    actions: Arc<dyn IssueActions>,
    user_tokens: Arc<dyn UserTokenStore>,
}

impl PermissionGate {
    pub fn new(
        source: Arc<dyn PermissionSource>,
        actions: Arc<dyn IssueActions>,
        user_tokens: Arc<dyn UserTokenStore>,
    ) -> Self {
        Self {
            source,
            actions,
            user_tokens,
        }
    }

    pub async fn enforce(&self, change: &IssueStateChange, installation_token: &str) -> GateDecision {
        if change.by_bot() {
            debug!(
                repo = %change.repo,
                issue = change.issue,
                actor = %change.actor,
                transition = ?change.transition,
                "issue transition made by a bot, not gating"
            );
            return GateDecision::SkippedBot;
        }

        let permissions = match self
            .source
            .fetch_permissions(&change.repo, installation_token)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    repo = %change.repo,
                    issue = change.issue,
                    error = %e,
                    "could not load permissions file, leaving issue untouched"
                );
                return GateDecision::Aborted;
            }
        };

        if permissions.allows(&change.actor) {
            info!(
                repo = %change.repo,
                issue = change.issue,
                actor = %change.actor,
                transition = ?change.transition,
                "issue transition permitted"
            );
            return GateDecision::Allowed;
        }

        warn!(
            repo = %change.repo,
            issue = change.issue,
            actor = %change.actor,
            transition = ?change.transition,
            "unauthorized issue transition, reverting"
        );

        let (token, credential) = match self.delegate_token(&permissions).await {
            Some((user, token)) => (token, RevertCredential::User(user)),
            None => (installation_token.to_string(), RevertCredential::Installation),
        };

        match change.transition {
            IssueTransition::Closed => {
                self.actions
                    .reopen_issue(&change.repo, change.issue, &token)
                    .await
            }
            IssueTransition::Reopened => {
                self.actions
                    .close_issue(&change.repo, change.issue, &token)
                    .await
            }
        }

        GateDecision::Reverted(credential)
    }

    /// First allow-listed user holding a stored personal token.
    async fn delegate_token(&self, permissions: &PermissionList) -> Option<(String, String)> {
        for user in permissions.users() {
            match self.user_tokens.get_user_token(user).await {
                Ok(Some(token)) => {
                    debug!(user = %user, "reverting with delegated user token");
                    return Some((user.clone(), token));
                }
                Ok(None) => {}
                Err(e) => warn!(user = %user, error = %e, "user token lookup failed"),
            }
        }
        debug!("no allow-listed user has a stored token, using installation token");
        None
    }
}
