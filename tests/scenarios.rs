//! End-to-end scenarios across the store, the client, the auth flow and the
//! tool router.
//!
//! Everything runs against a wiremock Altary service and a temporary config
//! file; no network access or browser is needed.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use altary_auth::{
    AuthFlow, AuthState, ExchangeStatus, NoBrowser, PendingExchange, TokenExchange,
};
use altary_client::RemoteClient;
use altary_mcp::Router;
use altary_session::SessionStore;
use altary_types::{AltaryError, DEFAULT_API_BASE_URL, Token};
use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct NeverCompletes;

struct Waiting;

#[async_trait]
impl TokenExchange for NeverCompletes {
    async fn begin(&self, _: &str) -> Result<Box<dyn PendingExchange>, AltaryError> {
        Ok(Box::new(Waiting))
    }
}

#[async_trait]
impl PendingExchange for Waiting {
    fn auth_url(&self) -> &str {
        "http://altary.test/users/claude-auth"
    }

    async fn poll(&mut self) -> Result<ExchangeStatus, AltaryError> {
        Ok(ExchangeStatus::Pending)
    }
}

struct Stack {
    _dir: tempfile::TempDir,
    store: Arc<SessionStore>,
    client: RemoteClient,
    auth: AuthFlow,
}

fn stack(base_url: Option<&str>) -> Stack {
    let dir = tempfile::tempdir().unwrap();
    let mut store = SessionStore::new(dir.path().join(".altary").join("config.json"));
    if let Some(url) = base_url {
        store = store.with_base_url_override(url);
    }
    let store = Arc::new(store);
    let client = RemoteClient::new(store.clone()).with_timeout(Duration::from_secs(5));
    let auth = AuthFlow::new(client.clone())
        .with_exchange(Arc::new(NeverCompletes))
        .with_browser(Arc::new(NoBrowser))
        .with_poll_interval(Duration::from_millis(5))
        .with_timeout(Duration::from_millis(40));
    Stack {
        _dir: dir,
        store,
        client,
        auth,
    }
}

#[tokio::test]
async fn fresh_environment_is_unauthenticated_without_network() {
    let s = stack(None);

    let session = s.store.load().await;
    assert_eq!(session.api_base_url, DEFAULT_API_BASE_URL);
    assert!(session.token.is_none());
    assert!(session.default_project_id.is_none());
    assert!(!s.store.path().exists());

    let err = s.client.list_projects().await.unwrap_err();
    assert!(
        matches!(err, AltaryError::Unauthenticated { status: None, .. }),
        "got {err:?}"
    );
    assert!(!s.store.path().exists());
}

#[tokio::test]
async fn accepted_token_is_sent_on_later_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/getUserProjects"))
        .and(header("X-Claude-Token", "tok-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "ALTR-1", "name": "Web"}])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let s = stack(Some(&server.uri()));
    let report = s.auth.authenticate_with_token("tok-1").await.unwrap();
    assert_eq!(report.state, AuthState::Succeeded);
    assert_eq!(s.store.load().await.token, Token::new("tok-1"));

    // A second process reading the same file sees the token.
    let reopened = Arc::new(
        SessionStore::new(s.store.path()).with_base_url_override(server.uri()),
    );
    let projects = RemoteClient::new(reopened).list_projects().await.unwrap();
    assert_eq!(projects[0].id, "ALTR-1");
}

#[tokio::test]
async fn interactive_flow_that_never_completes_expires() {
    let s = stack(Some("http://altary.test"));
    s.store.set_token("prior").await.unwrap();

    let report = s.auth.authenticate_interactive().await.unwrap();

    assert_eq!(report.state, AuthState::Expired);
    assert_eq!(s.store.load().await.token, Token::new("prior"));
}

#[tokio::test]
async fn explicit_project_bypasses_default_and_completion_is_exact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/issues/getError/ALTR-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "errors": [{"rand": "E1", "file": "a.rs", "line": 1, "message": "panic"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/issues/completeErrorWithSimilar/E1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"completed_ids": ["E1", "E2", "E3"]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let s = stack(Some(&server.uri()));
    s.store.set_token("tok").await.unwrap();
    s.store.set_default_project("ALTR-1").await.unwrap();

    let errors = s.client.list_errors(Some("ALTR-7")).await.unwrap();
    assert_eq!(errors.len(), 1);

    let outcome = s.client.complete_error(&errors[0].id).await.unwrap();
    let expected: BTreeSet<String> = ["E1", "E2", "E3"].into_iter().map(String::from).collect();
    assert_eq!(outcome.completed_ids, expected);
}

#[tokio::test]
async fn full_tool_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/getUserProjects"))
        .and(header("X-Claude-Token", "tok-xyz-123456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "projects": [{"report_rand": "ALTR-1", "name": "Web"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/issues/getError/ALTR-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "success", "errors": []})),
        )
        .mount(&server)
        .await;

    let s = stack(Some(&server.uri()));
    let router = Router::new(s.client.clone(), s.auth);

    let reply = router
        .dispatch("setup_auth", json!({"token": "tok-xyz-123456"}))
        .await;
    assert!(!reply.is_error, "{}", reply.text);

    let reply = router
        .dispatch("set_default_project", json!({"project_id": "ALTR-1"}))
        .await;
    assert!(!reply.is_error, "{}", reply.text);

    let reply = router.dispatch("show_config", json!({})).await;
    assert!(reply.text.contains("Token: `tok-xyz-...3456`"));
    assert!(reply.text.contains("**Configured**"));

    let reply = router.dispatch("get_errors", json!({})).await;
    assert_eq!(reply.text, "No open errors in project `ALTR-1`.");

    let reply = router.dispatch("clear_config", json!({})).await;
    assert!(!reply.is_error);
    let reply = router.dispatch("get_errors", json!({})).await;
    assert!(reply.is_error);
    assert!(reply.text.contains("No project selected"));
}
