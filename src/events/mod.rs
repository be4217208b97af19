//! Inbound webhook events and their handlers.

pub mod issues;
pub mod permissions;
pub mod pull_request;
pub mod router;

use serde::Deserialize;
use serde_json::Value;

use crate::github::types::{Account, RepoRef};

/// A webhook delivery that passed signature verification.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    pub action: Option<String>,
    pub payload: Value,
}

impl WebhookEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        let action = payload
            .get("action")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Self {
            event_type: event_type.into(),
            action,
            payload,
        }
    }

    pub fn installation_id(&self) -> Option<u64> {
        self.payload.get("installation")?.get("id")?.as_u64()
    }
}

// Typed views over the parts of the payloads the handlers read. Every field
// is optional so a truncated payload degrades to a logged no-op.

#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryPayload {
    pub name: Option<String>,
    pub owner: Option<Account>,
}

impl RepositoryPayload {
    pub fn repo_ref(&self) -> Option<RepoRef> {
        Some(RepoRef::new(self.owner.as_ref()?.login.clone(), self.name.clone()?))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssuePayload {
    pub number: Option<u64>,
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub comments_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SenderPayload {
    pub login: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl SenderPayload {
    /// GitHub Apps act as `<slug>[bot]` users of type `Bot`.
    pub fn is_bot(&self) -> bool {
        self.kind.as_deref() == Some("Bot")
            || self.login.as_deref().is_some_and(|l| l.ends_with("[bot]"))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssuesEventPayload {
    pub issue: Option<IssuePayload>,
    pub repository: Option<RepositoryPayload>,
    pub sender: Option<SenderPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullRequestPayload {
    pub number: Option<u64>,
    pub user: Option<Account>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PullRequestEventPayload {
    pub pull_request: Option<PullRequestPayload>,
    pub repository: Option<RepositoryPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_and_installation_extracted() {
        let event = WebhookEvent::new(
            "issues",
            json!({ "action": "opened", "installation": { "id": 99 } }),
        );
        assert_eq!(event.action.as_deref(), Some("opened"));
        assert_eq!(event.installation_id(), Some(99));
    }

    #[test]
    fn test_missing_installation() {
        let event = WebhookEvent::new("push", json!({ "ref": "refs/heads/main" }));
        assert!(event.action.is_none());
        assert!(event.installation_id().is_none());
    }

    #[test]
    fn test_repo_ref_requires_owner_and_name() {
        let full: RepositoryPayload =
            serde_json::from_value(json!({ "name": "hello", "owner": { "login": "octo" } }))
                .unwrap();
        assert_eq!(full.repo_ref(), Some(RepoRef::new("octo", "hello")));

        let partial: RepositoryPayload =
            serde_json::from_value(json!({ "name": "hello" })).unwrap();
        assert!(partial.repo_ref().is_none());
    }

    #[test]
    fn test_sender_bot_detection() {
        let bot: SenderPayload =
            serde_json::from_value(json!({ "login": "hubrelay[bot]", "type": "Bot" })).unwrap();
        assert!(bot.is_bot());

        let untyped: SenderPayload =
            serde_json::from_value(json!({ "login": "hubrelay[bot]" })).unwrap();
        assert!(untyped.is_bot());

        let human: SenderPayload =
            serde_json::from_value(json!({ "login": "octocat", "type": "User" })).unwrap();
        assert!(!human.is_bot());
    }
}
