mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::HarnessBuilder;
use hubrelay::store::UserTokenStore;

async fn get(harness: &common::Harness, uri: &str) -> (StatusCode, Value) {
    let app = hubrelay::api::router(harness.state.clone());
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

mod callback {
    use super::*;

    #[tokio::test]
    async fn test_code_exchanged_and_token_saved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gho_user", "token_type": "bearer", "scope": ""
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer gho_user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "maintainer" })))
            .expect(1)
            .mount(&server)
            .await;

        let harness = HarnessBuilder {
            oauth_base: server.uri(),
            ..Default::default()
        }
        .build();

        let (status, body) = get(&harness, "/github/callback?code=abc123").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "message": "Token received and saved successfully.", "username": "maintainer" })
        );
        assert_eq!(
            harness
                .user_tokens
                .get_user_token("maintainer")
                .await
                .unwrap()
                .as_deref(),
            Some("gho_user")
        );
    }

    #[tokio::test]
    async fn test_missing_code_is_bad_request() {
        let harness = HarnessBuilder::default().build();

        let (status, body) = get(&harness, "/github/callback").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "No authorization code provided." }));
    }

    #[tokio::test]
    async fn test_refused_code_is_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "bad_verification_code"
            })))
            .mount(&server)
            .await;

        let harness = HarnessBuilder {
            oauth_base: server.uri(),
            ..Default::default()
        }
        .build();

        let (status, body) = get(&harness, "/github/callback?code=stale").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Access token not received." }));
    }

    #[tokio::test]
    async fn test_failed_user_lookup_is_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "gho_user"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let harness = HarnessBuilder {
            oauth_base: server.uri(),
            ..Default::default()
        }
        .build();

        let (status, body) = get(&harness, "/github/callback?code=abc").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Failed to get user information." }));
        assert!(harness
            .user_tokens
            .get_user_token("maintainer")
            .await
            .unwrap()
            .is_none());
    }
}

mod installations {
    use super::*;

    #[tokio::test]
    async fn test_lists_installations() {
        let harness = HarnessBuilder::default().build();

        let (status, body) = get(&harness, "/installations").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "installations": [{ "id": 7, "account": { "login": "octo-org" } }] })
        );
    }

    #[tokio::test]
    async fn test_no_installations_is_not_found() {
        let mut builder = HarnessBuilder::default();
        builder.auth.installations.clear();
        let harness = builder.build();

        let (status, body) = get(&harness, "/installations").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({ "error": "No installations found or an error occurred." })
        );
    }

    #[tokio::test]
    async fn test_listing_failure_is_server_error() {
        let mut builder = HarnessBuilder::default();
        builder.auth.fail = true;
        let harness = builder.build();

        let (status, body) = get(&harness, "/installations").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("An error occurred:"));
    }
}
