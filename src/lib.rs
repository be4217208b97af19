//! hubrelay: GitHub App webhook relay.
//!
//! Receives signed webhook deliveries, authenticates as the installed app and
//! writes back labels, comments, issue state and PR links.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod events;
pub mod github;
pub mod store;
pub mod suggest;
pub mod vault;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use config::Config;
use events::router::EventRouter;
use github::auth::{InstallationAuth, TokenIssuer};
use github::client::GitHubClient;
use github::oauth::OAuthClient;
use store::{MemoryUserTokenStore, PgUserTokenStore, UserTokenStore};
use suggest::openai::OpenAiSuggester;
use suggest::{NoSuggestions, SuggestionSource};

/// Shared application state passed to handlers.
pub struct AppState {
    pub config: Config,
    pub auth: Arc<dyn InstallationAuth>,
    pub oauth: OAuthClient,
    pub user_tokens: Arc<dyn UserTokenStore>,
    pub events: EventRouter,
}

impl AppState {
    /// Wire the production collaborators from configuration.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let http = github::http_client().context("failed to build HTTP client")?;

        let issuer = TokenIssuer::new(
            config.app_id,
            &config.private_key,
            &config.github_api_url,
            http.clone(),
        )
        .context("invalid GitHub App private key")?;

        let user_tokens = open_user_token_store(&config).await?;

        let suggestions: Arc<dyn SuggestionSource> = match &config.openai_api_key {
            Some(key) => Arc::new(OpenAiSuggester::new(
                http.clone(),
                &config.openai_base_url,
                key,
                &config.openai_model,
            )),
            None => {
                info!("OPENAI_API_KEY not set, label and review suggestions disabled");
                Arc::new(NoSuggestions)
            }
        };

        let github = Arc::new(GitHubClient::new(http.clone(), &config.github_api_url));
        let events = EventRouter::new(github.clone(), suggestions, github, user_tokens.clone());

        let oauth = OAuthClient::new(
            http,
            &config.github_oauth_url,
            &config.github_api_url,
            &config.client_id,
            &config.client_secret,
        );

        Ok(Self {
            config,
            auth: Arc::new(issuer),
            oauth,
            user_tokens,
            events,
        })
    }
}

/// Postgres when `DATABASE_URL` is set, otherwise process memory.
pub async fn open_user_token_store(config: &Config) -> anyhow::Result<Arc<dyn UserTokenStore>> {
    match (&config.database_url, &config.master_key) {
        (Some(url), Some(key)) => {
            let store = PgUserTokenStore::connect(url, key).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        (Some(_), None) => anyhow::bail!("HUBRELAY_MASTER_KEY must be set when DATABASE_URL is configured"),
        (None, _) => {
            info!("DATABASE_URL not set, user tokens are kept in memory");
            Ok(Arc::new(MemoryUserTokenStore::new()))
        }
    }
}
