//! End-to-end refresh flow against a mock backend.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use reqwest::Url;
use serde_json::json;
use tally_application::{ApiClient, ClientConfig, ClientError, MemorySessionStore, RefreshState};
use tally_domain::{AuthError, Session};
use tally_infrastructure::{HttpTokenRefresher, RedirectSignOut, ReqwestTransport, SystemClock};
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Stack {
    client: ApiClient,
    store: MemorySessionStore,
    sign_out: Arc<RedirectSignOut>,
}

fn stack(server: &MockServer, session: Session) -> Stack {
    stack_with_timeout(server, session, None)
}

fn stack_with_timeout(server: &MockServer, session: Session, timeout: Option<Duration>) -> Stack {
    let base = Url::parse(&server.uri()).unwrap();
    let store = MemorySessionStore::with_session(session);
    let sign_out = Arc::new(RedirectSignOut::new(Arc::new(store.clone())));
    let client = ApiClient::new(
        Arc::new(
            ReqwestTransport::new(base.clone())
                .unwrap()
                .with_timeout(timeout),
        ),
        Arc::new(store.clone()),
        Arc::new(
            HttpTokenRefresher::new(&base)
                .unwrap()
                .with_timeout(timeout),
        ),
        sign_out.clone(),
        Arc::new(SystemClock::new()),
        ClientConfig::default(),
    );
    Stack {
        client,
        store,
        sign_out,
    }
}

async fn mount_invoices(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/invoices/"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Given token not valid for any token type",
            "code": "token_not_valid"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/invoices/"))
        .and(header("authorization", "Bearer tok2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn concurrent_401s_trigger_a_single_refresh() {
    let server = MockServer::start().await;
    mount_invoices(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(body_json(json!({ "refresh": "ref1" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "tok2" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let s = stack(&server, Session::new("tok1", Some("ref1".to_string())));

    let (a, b, c) = tokio::join!(
        s.client.get("/api/invoices/"),
        s.client.get("/api/invoices/"),
        s.client.get("/api/invoices/"),
    );

    for result in [a, b, c] {
        let response = result.unwrap();
        assert_eq!(
            response.json_body::<serde_json::Value>().unwrap(),
            json!([{ "id": 1 }])
        );
    }
    assert_eq!(s.client.refresh_state(), RefreshState::Idle);

    let updates = s.store.updates().await;
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].access_token, "tok2");
    assert_eq!(updates[0].refresh_token.as_deref(), Some("ref1"));
    assert!(updates[0].access_token_expires.is_some());
}

#[tokio::test]
async fn rejected_refresh_signs_out_every_waiter() {
    let server = MockServer::start().await;
    mount_invoices(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Token is blacklisted" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let s = stack(&server, Session::new("tok1", Some("ref1".to_string())));
    let mut redirects = s.sign_out.redirects();

    let (a, b) = tokio::join!(
        s.client.get("/api/invoices/"),
        s.client.get("/api/invoices/"),
    );

    for result in [a, b] {
        match result {
            Err(ClientError::Auth(AuthError::RefreshFailed { message })) => {
                assert!(message.contains("Token is blacklisted"));
            }
            other => panic!("Expected refresh failure, got {other:?}"),
        }
    }

    assert_eq!(s.client.refresh_state(), RefreshState::Failed);
    assert!(s.store.get().await.is_none());
    redirects.changed().await.unwrap();
    assert_eq!(redirects.borrow().as_deref(), Some("/auth/signin"));
}

#[tokio::test]
async fn hung_refresh_times_out_and_releases_waiters() {
    let server = MockServer::start().await;
    mount_invoices(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "tok2" }))
                .set_delay(Duration::from_secs(30)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let s = stack_with_timeout(
        &server,
        Session::new("tok1", Some("ref1".to_string())),
        Some(Duration::from_millis(200)),
    );

    let (a, b) = tokio::join!(
        s.client.get("/api/invoices/"),
        s.client.get("/api/invoices/"),
    );

    for result in [a, b] {
        assert!(
            matches!(result, Err(ClientError::Auth(AuthError::Network { .. }))),
            "Expected network error, got {result:?}"
        );
    }
    assert_eq!(s.client.refresh_state(), RefreshState::Failed);
    assert_eq!(s.client.pending_refreshes(), 0);
}

#[tokio::test]
async fn token_endpoints_are_called_without_credentials() {
    let server = MockServer::start().await;
    Mock::given(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "No active account found with the given credentials"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let s = stack(&server, Session::new("tok1", Some("ref1".to_string())));

    let err = s
        .client
        .post(
            "/api/token/",
            Some(json!({ "username": "ada", "password": "wrong" })),
        )
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(s.client.refresh_state(), RefreshState::Idle);
    assert!(s.store.get().await.is_some());
}
