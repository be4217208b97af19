use std::sync::Arc;

use tracing::debug;

use super::issues;
use super::permissions::{GateDecision, IssueTransition, PermissionGate, PermissionSource};
use super::pull_request;
use super::WebhookEvent;
use crate::github::IssueActions;
use crate::store::UserTokenStore;
use crate::suggest::SuggestionSource;

/// Handler selected for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SuggestLabels,
    GateIssueState(IssueTransition),
    ReviewPullRequest,
    Ignored,
}

impl Route {
    pub fn for_event(event_type: &str, action: Option<&str>) -> Self {
        match (event_type, action) {
            ("issues", Some("opened")) => Route::SuggestLabels,
            ("issues", Some(a)) => IssueTransition::from_action(a)
                .map(Route::GateIssueState)
                .unwrap_or(Route::Ignored),
            ("pull_request", Some("opened")) => Route::ReviewPullRequest,
            _ => Route::Ignored,
        }
    }
}

/// What a dispatch did, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Handled(Route),
    Gated(Option<GateDecision>),
    Ignored,
}

pub struct EventRouter {
    actions: Arc<dyn IssueActions>,
    suggestions: Arc<dyn SuggestionSource>,
    gate: PermissionGate,
}

impl EventRouter {
    pub fn new(
        actions: Arc<dyn IssueActions>,
        suggestions: Arc<dyn SuggestionSource>,
        permissions: Arc<dyn PermissionSource>,
        user_tokens: Arc<dyn UserTokenStore>,
    ) -> Self {
        let gate = PermissionGate::new(permissions, actions.clone(), user_tokens);
        Self {
            actions,
            suggestions,
            gate,
        }
    }

    /// Run the handler for `event` to completion. Handlers log and swallow
    /// their own failures.
    pub async fn dispatch(&self, event: &WebhookEvent, token: &str) -> Dispatch {
        let route = Route::for_event(&event.event_type, event.action.as_deref());
        debug!(
            event = %event.event_type,
            action = ?event.action,
            route = ?route,
            "dispatching webhook event"
        );

        match route {
            Route::SuggestLabels => {
                issues::label_new_issue(
                    self.actions.as_ref(),
                    self.suggestions.as_ref(),
                    &event.payload,
                    token,
                )
                .await;
                Dispatch::Handled(route)
            }
            Route::GateIssueState(transition) => Dispatch::Gated(
                issues::gate_state_change(&self.gate, transition, &event.payload, token).await,
            ),
            Route::ReviewPullRequest => {
                pull_request::review_new_pull_request(
                    self.actions.as_ref(),
                    self.suggestions.as_ref(),
                    &event.payload,
                    token,
                )
                .await;
                Dispatch::Handled(route)
            }
            Route::Ignored => Dispatch::Ignored,
        }
    }
}
