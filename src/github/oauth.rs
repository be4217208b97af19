//! OAuth web flow: trade an authorization code for a user token and look up
//! who it belongs to.

use serde::Deserialize;
use thiserror::Error;

use super::{ACCEPT, API_VERSION};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Error getting access token.")]
    Exchange { status: u16 },

    #[error("Access token not received.")]
    MissingAccessToken,

    #[error("Failed to get user information.")]
    UserLookup { status: u16 },

    #[error("Could not get the user's username.")]
    MissingLogin,

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct AccessTokenReply {
    #[serde(default)]
    access_token: Option<String>,
    /// GitHub answers 200 with an `error` field for bad or expired codes.
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserReply {
    #[serde(default)]
    login: Option<String>,
}

#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    oauth_base: String,
    api_base: String,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    pub fn new(
        http: reqwest::Client,
        oauth_base: impl Into<String>,
        api_base: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            oauth_base: oauth_base.into().trim_end_matches('/').to_string(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let resp = self
            .http
            .post(format!("{}/login/oauth/access_token", self.oauth_base))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(OAuthError::Exchange {
                status: resp.status().as_u16(),
            });
        }

        let reply: AccessTokenReply = resp
            .json()
            .await
            .map_err(|e| OAuthError::Decode(e.to_string()))?;

        if let Some(error) = reply.error.as_deref() {
            tracing::warn!(error, "OAuth code exchange refused");
        }

        reply
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(OAuthError::MissingAccessToken)
    }

    /// Login of the user owning `token`.
    pub async fn fetch_login(&self, token: &str) -> Result<String, OAuthError> {
        let resp = self
            .http
            .get(format!("{}/user", self.api_base))
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(OAuthError::UserLookup {
                status: resp.status().as_u16(),
            });
        }

        let user: UserReply = resp
            .json()
            .await
            .map_err(|e| OAuthError::Decode(e.to_string()))?;

        user.login
            .filter(|l| !l.is_empty())
            .ok_or(OAuthError::MissingLogin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OAuthClient {
        OAuthClient::new(
            reqwest::Client::new(),
            server.uri(),
            server.uri(),
            "Iv1.abc",
            "shh",
        )
    }

    #[tokio::test]
    async fn test_exchange_code_returns_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("client_id=Iv1.abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "gho_123", "token_type": "bearer", "scope": ""
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client(&server).exchange_code("the-code").await.unwrap();
        assert_eq!(token, "gho_123");
    }

    #[tokio::test]
    async fn test_bad_verification_code_has_no_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "bad_verification_code"
            })))
            .mount(&server)
            .await;

        let err = client(&server).exchange_code("stale").await.unwrap_err();
        assert!(matches!(err, OAuthError::MissingAccessToken));
    }

    #[tokio::test]
    async fn test_user_without_login_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 1 })))
            .mount(&server)
            .await;

        let err = client(&server).fetch_login("gho_123").await.unwrap_err();
        assert!(matches!(err, OAuthError::MissingLogin));
    }

    #[tokio::test]
    async fn test_user_lookup_status_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).fetch_login("expired").await.unwrap_err();
        assert!(matches!(err, OAuthError::UserLookup { status: 401 }));
    }
}
