//! End-to-end tests: signed request → router → broker → mocked Vault.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use vault_reposecrets::{
    api::{self, signature, AppState},
    config::StoreConfig,
    crypto,
    secrets::FindError,
    vault::VaultError,
    Secret, SecretBroker, SecretFinder, SecretRequest,
};
use wiremock::matchers::{header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHARED_SECRET: &str = "correct-horse-battery-staple-0123";
const DATE: &str = "Wed, 08 Jun 2022 09:00:00 GMT";
const REQUEST: &str = r#"{"name":"DB_PASSWORD","repo":{"slug":"acme/widget"}}"#;
const SECRET_PATH: &str = "/v1/secret/data/drone/acme/widget";

fn broker(vault: &MockServer, timeout: Duration) -> SecretBroker {
    SecretBroker::from_store_config(&StoreConfig {
        secret_path_template: "secret/data/drone/%s".to_string(),
        address: vault.uri(),
        role_id: "role-123".to_string(),
        secret_id: "secret-456".to_string(),
        request_timeout: Some(timeout),
    })
    .unwrap()
}

fn app_with_timeout(vault: &MockServer, timeout: Duration) -> Router {
    let broker = broker(vault, timeout);
    api::router(Arc::new(AppState::new(SHARED_SECRET, Arc::new(broker))))
}

fn app(vault: &MockServer) -> Router {
    app_with_timeout(vault, Duration::from_secs(5))
}

fn signed_request(body: &str, secret: &str, accept_encoding: Option<&str>) -> Request<Body> {
    let mut headers = HeaderMap::new();
    headers.insert("date", HeaderValue::from_static(DATE));
    headers.insert(
        "digest",
        HeaderValue::from_str(&signature::body_digest(body.as_bytes())).unwrap(),
    );
    let sig = signature::sign(
        secret,
        "hmac-key",
        &[signature::REQUEST_TARGET, "date", "digest"],
        &Method::POST,
        "/",
        &headers,
    )
    .unwrap();

    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header("date", DATE)
        .header("digest", headers.get("digest").unwrap())
        .header("signature", sig)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(encoding) = accept_encoding {
        builder = builder.header(header::ACCEPT_ENCODING, encoding);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn mount_login(vault: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth": { "client_token": "s.token" }
        })))
        .mount(vault)
        .await;
}

async fn mount_secret(vault: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(SECRET_PATH))
        .and(header_eq("X-Vault-Token", "s.token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(vault)
        .await;
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn returns_stored_string() {
    let vault = MockServer::start().await;
    mount_login(&vault).await;
    mount_secret(&vault, json!({ "data": { "data": { "DB_PASSWORD": "s3cr3t" } } })).await;

    let response = app(&vault)
        .oneshot(signed_request(REQUEST, SHARED_SECRET, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_bytes(response).await,
        br#"{"name":"DB_PASSWORD","data":"s3cr3t","pull":false,"fork":false}"#.to_vec()
    );
}

#[tokio::test]
async fn absent_key_returns_encoded_null() {
    let vault = MockServer::start().await;
    mount_login(&vault).await;
    mount_secret(&vault, json!({ "data": { "data": { "API_KEY": "k" } } })).await;

    let response = app(&vault)
        .oneshot(signed_request(REQUEST, SHARED_SECRET, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let secret: Secret = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(secret.name, "DB_PASSWORD");
    assert_eq!(secret.data, "null");
    assert!(!secret.pull && !secret.fork);
}

#[tokio::test]
async fn single_level_entry_is_not_found() {
    let vault = MockServer::start().await;
    mount_login(&vault).await;
    mount_secret(&vault, json!({ "data": { "DB_PASSWORD": "s3cr3t" } })).await;

    let response = app(&vault)
        .oneshot(signed_request(REQUEST, SHARED_SECRET, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_signature_never_contacts_vault() {
    let vault = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&vault)
        .await;

    let response = app(&vault)
        .oneshot(signed_request(
            REQUEST,
            "an-entirely-different-shared-secret",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let unsigned = Request::builder()
        .method("POST")
        .uri("/")
        .body(Body::from(REQUEST))
        .unwrap();
    let response = app(&vault).oneshot(unsigned).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_login_is_not_found() {
    let vault = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": ["invalid secret id"]
        })))
        .mount(&vault)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&vault)
        .await;

    let response = app(&vault)
        .oneshot(signed_request(REQUEST, SHARED_SECRET, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(response).await, api::NOT_FOUND_MESSAGE.as_bytes().to_vec());
}

#[tokio::test]
async fn encrypted_response_matches_plain_payload() {
    let vault = MockServer::start().await;
    mount_login(&vault).await;
    mount_secret(&vault, json!({ "data": { "data": { "DB_PASSWORD": "s3cr3t" } } })).await;

    let plain = body_bytes(
        app(&vault)
            .oneshot(signed_request(REQUEST, SHARED_SECRET, None))
            .await
            .unwrap(),
    )
    .await;

    let response = app(&vault)
        .oneshot(signed_request(REQUEST, SHARED_SECRET, Some("aesgcm")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_ENCODING).unwrap(), "aesgcm");
    let blob = body_bytes(response).await;

    let key = crypto::derive_key(SHARED_SECRET).unwrap();
    assert_eq!(crypto::decrypt(&key, &blob).unwrap(), plain);

    let wrong = crypto::derive_key("another-shared-secret-that-is-long-enough").unwrap();
    assert!(crypto::decrypt(&wrong, &blob).is_err());
}

#[tokio::test]
async fn fresh_tokens_yield_identical_data() {
    let vault = MockServer::start().await;
    let logins = Arc::new(AtomicUsize::new(0));
    let counter = logins.clone();
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(move |_: &wiremock::Request| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(200).set_body_json(json!({
                "auth": { "client_token": format!("s.token-{}", n) }
            }))
        })
        .mount(&vault)
        .await;
    Mock::given(method("GET"))
        .and(path(SECRET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "data": { "DB_PASSWORD": { "user": "app", "password": "s3cr3t" } } }
        })))
        .expect(3)
        .mount(&vault)
        .await;

    let app = app(&vault);
    let mut bodies = Vec::new();
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(signed_request(REQUEST, SHARED_SECRET, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        bodies.push(body_bytes(response).await);
    }

    assert_eq!(logins.load(Ordering::SeqCst), 3);
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    let secret: Secret = serde_json::from_slice(&bodies[0]).unwrap();
    let data: serde_json::Value = serde_json::from_str(&secret.data).unwrap();
    assert_eq!(data, json!({ "user": "app", "password": "s3cr3t" }));

    let tokens: Vec<String> = vault
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter_map(|r| r.headers.get("x-vault-token"))
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect();
    assert_eq!(tokens, vec!["s.token-0", "s.token-1", "s.token-2"]);
}

#[tokio::test]
async fn slow_vault_times_out_as_not_found() {
    let vault = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "auth": { "client_token": "s.token" } }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&vault)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&vault)
        .await;

    let request = SecretRequest::new("DB_PASSWORD", "acme/widget");
    let started = Instant::now();
    let err = broker(&vault, Duration::from_secs(1))
        .find(&request)
        .await
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(4));
    match err {
        FindError::UpstreamAuth(VaultError::Transport(cause)) => {
            assert!(cause.starts_with("timeout"), "unexpected cause: {}", cause)
        }
        other => panic!("expected a transport timeout, got {:?}", other),
    }

    let started = Instant::now();
    let response = app_with_timeout(&vault, Duration::from_secs(1))
        .oneshot(signed_request(REQUEST, SHARED_SECRET, None))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(response).await, api::NOT_FOUND_MESSAGE.as_bytes().to_vec());
}

#[tokio::test]
async fn dropped_request_abandons_vault_calls() {
    let vault = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "auth": { "client_token": "s.token" } }))
                .set_delay(Duration::from_secs(1)),
        )
        .mount(&vault)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "data": { "DB_PASSWORD": "s3cr3t" } }
        })))
        .expect(0)
        .mount(&vault)
        .await;

    let pending = app(&vault).oneshot(signed_request(REQUEST, SHARED_SECRET, None));
    assert!(tokio::time::timeout(Duration::from_millis(500), pending)
        .await
        .is_err());

    // Outlast the login delay so a surviving task would have issued the read.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let received = vault.received_requests().await.unwrap();
    assert_eq!(received.iter().filter(|r| r.method.as_str() == "POST").count(), 1);
    assert_eq!(received.iter().filter(|r| r.method.as_str() == "GET").count(), 0);
}
