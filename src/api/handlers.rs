use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::events::WebhookEvent;
use crate::github::signature;
use crate::AppState;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const EVENT_HEADER: &str = "x-github-event";

// ── Webhook ──────────────────────────────────────────────────

/// POST /webhook
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let header = headers
        .get(SIGNATURE_HEADER)
        .ok_or(AppError::MissingSignature)?;

    if !signature::verify(&state.config.webhook_secret, &body, header.to_str().ok()) {
        warn!(bytes = body.len(), "webhook signature mismatch");
        return Err(AppError::InvalidSignature);
    }

    let payload = parse_payload(&body).ok_or(AppError::MissingPayload)?;

    let event_type = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("ping")
        .to_string();
    let event = WebhookEvent::new(event_type, payload);

    let installation_id = event
        .installation_id()
        .ok_or(AppError::MissingInstallation)?;

    let token = state
        .auth
        .installation_token(installation_id)
        .await
        .map_err(|e| {
            error!(installation_id, error = %e, "failed to obtain installation token");
            AppError::TokenUnavailable
        })?;

    info!(
        event = %event.event_type,
        action = ?event.action,
        installation_id,
        "webhook received"
    );
    let outcome = state.events.dispatch(&event, &token).await;
    tracing::debug!(outcome = ?outcome, "webhook handled");

    Ok(Json(json!({
        "message": format!("Webhook received for event: {}", event.event_type)
    })))
}

/// Empty bodies, non-JSON bodies, `null` and `{}` all count as no payload.
fn parse_payload(body: &[u8]) -> Option<Value> {
    match serde_json::from_slice::<Value>(body).ok()? {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other),
    }
}

// ── Installations ────────────────────────────────────────────

/// GET /installations
pub async fn list_installations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let installations = state.auth.list_installations().await.map_err(|e| {
        error!(error = %e, "failed to list installations");
        AppError::Upstream(e.to_string())
    })?;

    if installations.is_empty() {
        return Err(AppError::NoInstallations);
    }

    Ok(Json(json!({ "installations": installations })))
}

// ── OAuth callback ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
}

/// GET /github/callback
pub async fn github_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<Value>, AppError> {
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AppError::MissingCode)?;

    let token = state.oauth.exchange_code(&code).await.map_err(|e| {
        warn!(error = %e, "OAuth code exchange failed");
        AppError::OAuth(e.to_string())
    })?;

    let username = state.oauth.fetch_login(&token).await.map_err(|e| {
        warn!(error = %e, "OAuth user lookup failed");
        AppError::OAuth(e.to_string())
    })?;

    state
        .user_tokens
        .save_user_token(&username, &token)
        .await?;
    info!(username = %username, "stored user token");

    Ok(Json(json!({
        "message": "Token received and saved successfully.",
        "username": username,
    })))
}
