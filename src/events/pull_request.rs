//! `pull_request` event handler: review the change and link the issue it
//! most likely resolves.

use serde_json::Value;
use tracing::{info, warn};

use super::PullRequestEventPayload;
use crate::github::IssueActions;
use crate::suggest::{ReviewRequest, SuggestionSource};

pub fn linked_issue_comment(issue: u64) -> String {
    format!(
        "An issue has been linked to this Pull Request: **closes #{issue}**.\n\n\
         Please verify that this is the correct issue. If it is not, you can:\n\
         1. Modify the line `closes #{issue}` in the Pull Request description to the correct issue number.\n\
         2. Remove the line entirely and manually link the issue using the menu on the right."
    )
}

pub const NO_RELATED_ISSUE_COMMENT: &str =
    "Please check if you have any **issues assigned** related to this pull request.\n\n\
     I looked through all of your open issue titles and it seems that either **I couldn't identify** \
     any that relate to this pull request or **you don't have any issues assigned to you**.";

/// `pull_request.opened`.
pub async fn review_new_pull_request(
    actions: &dyn IssueActions,
    suggestions: &dyn SuggestionSource,
    payload: &Value,
    token: &str,
) {
    let parsed: PullRequestEventPayload = match serde_json::from_value(payload.clone()) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "malformed pull_request payload");
            return;
        }
    };

    let Some(repo) = parsed.repository.as_ref().and_then(|r| r.repo_ref()) else {
        warn!("pull_request payload has no repository, skipping review");
        return;
    };
    let Some(pr) = parsed.pull_request else {
        warn!(repo = %repo, "pull_request payload has no pull request, skipping review");
        return;
    };
    let Some(number) = pr.number else {
        warn!(repo = %repo, "pull request has no number, skipping review");
        return;
    };

    let pull_request = match actions.get_pull_request(&repo, number, token).await {
        Ok(p) => p,
        Err(e) => {
            warn!(repo = %repo, pull = number, error = %e, "could not fetch pull request");
            return;
        }
    };
    let files = match actions.get_pull_request_files(&repo, number, token).await {
        Ok(f) => f,
        Err(e) => {
            warn!(repo = %repo, pull = number, error = %e, "could not fetch pull request files");
            return;
        }
    };

    let open_issues = match pr.user.as_ref() {
        Some(author) => actions
            .list_open_issues_by_author(&repo, &author.login, token)
            .await
            .unwrap_or_else(|e| {
                warn!(repo = %repo, author = %author.login, error = %e, "could not list author issues");
                Vec::new()
            }),
        None => Vec::new(),
    };

    let request = ReviewRequest {
        pull_request,
        files,
        open_issues,
    };
    let review = match suggestions.review_pull_request(&request).await {
        Ok(r) => r,
        Err(e) => {
            warn!(repo = %repo, pull = number, error = %e, "pull request review failed");
            return;
        }
    };

    let comments_url = actions.comments_url(&repo, number);

    // Only accept a guess that is one of the author's open issues.
    let related = review
        .related_issue
        .filter(|n| request.open_issues.iter().any(|i| i.number == *n));
    if review.related_issue.is_some() && related.is_none() {
        warn!(repo = %repo, pull = number, suggested = ?review.related_issue, "suggested issue is not an open issue of the author");
    }

    match related {
        Some(issue) => {
            if actions.link_issue_to_pr(&repo, number, issue, token).await {
                info!(repo = %repo, pull = number, issue, "linked issue to pull request");
                actions
                    .comment_on(&comments_url, &linked_issue_comment(issue), token)
                    .await;
            } else {
                warn!(repo = %repo, pull = number, issue, "failed to link issue to pull request");
            }
        }
        None => {
            actions
                .comment_on(&comments_url, NO_RELATED_ISSUE_COMMENT, token)
                .await;
        }
    }

    if let Some(text) = review.review.as_deref() {
        actions.comment_on(&comments_url, text, token).await;
    }
}
