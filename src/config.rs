use anyhow::Context;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_GITHUB_OAUTH_URL: &str = "https://github.com";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Public base URL of this service, used to build the OAuth callback URI.
    pub base_url: String,
    pub app_id: u64,
    /// PEM-encoded RSA private key of the GitHub App.
    pub private_key: String,
    pub webhook_secret: String,
    pub client_id: String,
    pub client_secret: String,
    pub github_api_url: String,
    pub github_oauth_url: String,
    /// When unset, personal tokens live in process memory only.
    pub database_url: Option<String>,
    /// 64 hex chars. Required together with `database_url`.
    pub master_key: Option<String>,
    /// When unset, label and review suggestions are disabled.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
}

impl Config {
    /// Redirect target registered with the GitHub OAuth app.
    pub fn callback_uri(&self) -> String {
        format!("{}/github/callback", self.base_url.trim_end_matches('/'))
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_vars(|name| std::env::var(name).ok())
}

/// Build a config from an arbitrary variable source.
pub fn from_vars<F>(var: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |name: &str| -> anyhow::Result<String> {
        var(name)
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("{} is not set", name))
    };

    let app_id = required("GITHUB_APP_ID")?
        .trim()
        .parse::<u64>()
        .context("GITHUB_APP_ID must be a number")?;

    let private_key = match var("PRIVATE_KEY").filter(|v| !v.trim().is_empty()) {
        // .env files frequently carry the PEM on one line with literal "\n"
        Some(inline) => inline.replace("\\n", "\n"),
        None => {
            let path = var("PRIVATE_KEY_PATH")
                .context("PRIVATE_KEY or PRIVATE_KEY_PATH must be set")?;
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read private key from {}", path))?
        }
    };

    let database_url = var("DATABASE_URL").filter(|v| !v.trim().is_empty());
    let master_key = var("HUBRELAY_MASTER_KEY").filter(|v| !v.trim().is_empty());
    if database_url.is_some() && master_key.is_none() {
        anyhow::bail!("HUBRELAY_MASTER_KEY must be set when DATABASE_URL is configured");
    }

    let port = match var("HUBRELAY_PORT") {
        Some(p) => p.parse().context("HUBRELAY_PORT must be a port number")?,
        None => DEFAULT_PORT,
    };

    Ok(Config {
        port,
        base_url: var("BASE_URL").unwrap_or_else(|| format!("http://localhost:{}", port)),
        app_id,
        private_key,
        webhook_secret: required("WEBHOOK_SECRET")?,
        client_id: required("CLIENT_ID")?,
        client_secret: required("CLIENT_SECRET")?,
        github_api_url: var("GITHUB_API_URL")
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.into())
            .trim_end_matches('/')
            .to_string(),
        github_oauth_url: var("GITHUB_OAUTH_URL")
            .unwrap_or_else(|| DEFAULT_GITHUB_OAUTH_URL.into())
            .trim_end_matches('/')
            .to_string(),
        database_url,
        master_key,
        openai_api_key: var("OPENAI_API_KEY").filter(|v| !v.trim().is_empty()),
        openai_base_url: var("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into())
            .trim_end_matches('/')
            .to_string(),
        openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
    })
}
