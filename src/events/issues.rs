//! `issues` event handlers.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::permissions::{GateDecision, IssueStateChange, IssueTransition, PermissionGate};
use super::IssuesEventPayload;
use crate::github::IssueActions;
use crate::suggest::{IssueDraft, SuggestionSource};

pub const NO_LABELS_COMMENT: &str = "No suggested labels were generated for this issue.";

pub fn labels_comment(labels: &[String]) -> String {
    format!("Suggested labels for this issue: {}", labels.join(", "))
}

/// `issues.opened`: suggest labels, announce them and apply them.
pub async fn label_new_issue(
    actions: &dyn IssueActions,
    suggestions: &dyn SuggestionSource,
    payload: &Value,
    token: &str,
) {
    let parsed: IssuesEventPayload = match serde_json::from_value(payload.clone()) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "malformed issues payload");
            return;
        }
    };

    let Some(repo) = parsed.repository.as_ref().and_then(|r| r.repo_ref()) else {
        warn!("issues payload has no repository, skipping label suggestion");
        return;
    };
    let Some(issue) = parsed.issue else {
        warn!(repo = %repo, "issues payload has no issue, skipping label suggestion");
        return;
    };
    let Some(number) = issue.number else {
        warn!(repo = %repo, "issue has no number, skipping label suggestion");
        return;
    };
    let comments_url = issue
        .comments_url
        .clone()
        .unwrap_or_else(|| actions.comments_url(&repo, number));

    let existing = match actions.list_repo_labels(&repo, token).await {
        Ok(labels) => labels,
        Err(e) => {
            warn!(repo = %repo, error = %e, "could not list repository labels");
            Vec::new()
        }
    };

    let draft = IssueDraft {
        title: issue.title.unwrap_or_default(),
        body: issue.body.unwrap_or_default(),
    };

    let labels = match suggestions.suggest_labels(&draft, &existing).await {
        Ok(labels) => labels,
        Err(e) => {
            warn!(repo = %repo, issue = number, error = %e, "label suggestion failed");
            Vec::new()
        }
    };

    if labels.is_empty() {
        debug!(repo = %repo, issue = number, "no labels suggested");
        actions.comment_on(&comments_url, NO_LABELS_COMMENT, token).await;
        return;
    }

    info!(repo = %repo, issue = number, labels = ?labels, "applying suggested labels");
    actions
        .comment_on(&comments_url, &labels_comment(&labels), token)
        .await;
    actions.set_labels(&repo, number, &labels, token).await;
}

/// `issues.closed` / `issues.reopened`: revert the transition unless the
/// sender is allow-listed or a bot. `None` when the payload lacks what the
/// gate needs.
pub async fn gate_state_change(
    gate: &PermissionGate,
    transition: IssueTransition,
    payload: &Value,
    token: &str,
) -> Option<GateDecision> {
    let parsed: IssuesEventPayload = match serde_json::from_value(payload.clone()) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "malformed issues payload");
            return None;
        }
    };

    let repo = parsed.repository.as_ref().and_then(|r| r.repo_ref());
    let issue = parsed.issue.as_ref().and_then(|i| i.number);
    let actor_is_bot = parsed.sender.as_ref().is_some_and(|s| s.is_bot());
    let actor = parsed.sender.and_then(|s| s.login);

    let (Some(repo), Some(issue), Some(actor)) = (repo, issue, actor) else {
        warn!(?transition, "issues payload incomplete, skipping permission check");
        return None;
    };

    let change = IssueStateChange {
        repo,
        issue,
        actor,
        actor_is_bot,
        transition,
    };
    Some(gate.enforce(&change, token).await)
}
