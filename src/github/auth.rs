//! GitHub App authentication.
//!
//! 1. Mint a 10-minute RS256 app assertion (`iss` = app id).
//! 2. Exchange it at `POST /app/installations/{id}/access_tokens`.
//! 3. Cache the installation token per installation id until shortly before
//!    it expires.
//!
//! Every installation owns its own async mutex, so concurrent deliveries for
//! the same installation mint at most once while other installations proceed
//! in parallel.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::Installation;
use super::{GitHubError, ACCEPT, API_VERSION};

/// Lifetime of an app assertion. GitHub rejects anything above 10 minutes.
const ASSERTION_TTL_SECS: i64 = 600;
/// Assumed token lifetime when the exchange response omits `expires_at`.
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;
/// Cached tokens are retired this long before their real expiry.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid GitHub App private key: {0}")]
    InvalidKey(jsonwebtoken::errors::Error),

    #[error("failed to sign app assertion: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("token exchange failed: {0}")]
    Exchange(#[from] GitHubError),
}

/// Installation credentials as seen by the HTTP layer.
#[async_trait]
pub trait InstallationAuth: Send + Sync {
    async fn installation_token(&self, installation_id: u64) -> Result<String, TokenError>;

    async fn list_installations(&self) -> Result<Vec<Installation>, TokenError>;
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AppClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl AppClaims {
    pub fn at(app_id: u64, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            iat,
            exp: iat + ASSERTION_TTL_SECS,
            iss: app_id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    /// Already includes the refresh margin.
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

type Slot = Arc<Mutex<Option<CachedToken>>>;

/// Mints app assertions and owns the installation-token cache.
pub struct TokenIssuer {
    app_id: u64,
    key: EncodingKey,
    http: reqwest::Client,
    api_base: String,
    slots: DashMap<u64, Slot>,
}

impl TokenIssuer {
    pub fn new(
        app_id: u64,
        private_key_pem: &str,
        api_base: impl Into<String>,
        http: reqwest::Client,
    ) -> Result<Self, TokenError> {
        let key =
            EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).map_err(TokenError::InvalidKey)?;
        Ok(Self {
            app_id,
            key,
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            slots: DashMap::new(),
        })
    }

    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    /// Signed assertion identifying the app itself, valid for 10 minutes.
    pub fn mint_app_assertion(&self) -> Result<String, TokenError> {
        let claims = AppClaims::at(self.app_id, Utc::now());
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(TokenError::Signing)
    }

    /// Return a valid installation token, exchanging a fresh assertion only
    /// when the cached one is missing or expired.
    pub async fn get_installation_token(&self, installation_id: u64) -> Result<String, TokenError> {
        // Clone the slot out so the map shard lock is released before awaiting.
        let slot: Slot = self
            .slots
            .entry(installation_id)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut cached = slot.lock().await;
        if let Some(existing) = cached.as_ref() {
            if existing.is_fresh(Utc::now()) {
                debug!(installation_id, "reusing cached installation token");
                return Ok(existing.token.clone());
            }
        }

        let issued_at = Utc::now();
        let fresh = self.exchange(installation_id).await?;
        let expires_at = fresh
            .expires_at
            .unwrap_or(issued_at + Duration::seconds(DEFAULT_TOKEN_TTL_SECS))
            - Duration::seconds(REFRESH_MARGIN_SECS);

        info!(installation_id, %expires_at, "minted new installation token");
        *cached = Some(CachedToken {
            token: fresh.token.clone(),
            expires_at,
        });
        Ok(fresh.token)
    }

    async fn exchange(&self, installation_id: u64) -> Result<AccessTokenResponse, TokenError> {
        let assertion = self.mint_app_assertion()?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base, installation_id
        );

        let resp = self
            .http
            .post(&url)
            .bearer_auth(assertion)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(GitHubError::from)?;

        if resp.status() != reqwest::StatusCode::CREATED {
            let err = GitHubError::from_response(resp).await;
            warn!(installation_id, error = %err, "installation token exchange rejected");
            return Err(err.into());
        }

        resp.json::<AccessTokenResponse>()
            .await
            .map_err(|e| TokenError::Exchange(GitHubError::Decode(e.to_string())))
    }

    /// All installations of this app, authenticated with a fresh assertion.
    pub async fn list_installations(&self) -> Result<Vec<Installation>, TokenError> {
        let assertion = self.mint_app_assertion()?;
        let resp = self
            .http
            .get(format!("{}/app/installations", self.api_base))
            .bearer_auth(assertion)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(GitHubError::from)?;

        if !resp.status().is_success() {
            let err = GitHubError::from_response(resp).await;
            warn!(error = %err, "listing installations failed");
            return Err(err.into());
        }

        resp.json::<Vec<Installation>>()
            .await
            .map_err(|e| TokenError::Exchange(GitHubError::Decode(e.to_string())))
    }
}

#[async_trait]
impl InstallationAuth for TokenIssuer {
    async fn installation_token(&self, installation_id: u64) -> Result<String, TokenError> {
        self.get_installation_token(installation_id).await
    }

    async fn list_installations(&self) -> Result<Vec<Installation>, TokenError> {
        TokenIssuer::list_installations(self).await
    }
}
