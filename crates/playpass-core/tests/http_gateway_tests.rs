//! reqwest gateway tests against a local backend

mod common;

use std::{collections::HashMap, time::Duration};

use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use playpass_core::gateway::{Body, HttpRequest, ParsedResponse};
use playpass_core::{
    EndpointConfig, Error, Gateway, GatewayExt, GatewayOptions, HttpGateway, Pipeline, Stage,
};
use rstest::*;
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;

// ============================================================================
// Test server infrastructure
// ============================================================================

struct TestServer {
    base_url: Url,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    async fn new(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });

        tokio::spawn(async move {
            server.await.unwrap();
        });

        Self {
            base_url: Url::parse(&format!("http://{}", addr)).unwrap(),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    fn url(&self, path: &str) -> Url {
        self.base_url.join(path).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

// ============================================================================
// Backend endpoints
// ============================================================================

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn encrypt(
    Path(provider): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    if form.get("providerid") != Some(&provider) || form.get("devicetype").map(String::as_str) != Some("PC") {
        return Json(json!({"reason": "bad device form"}));
    }
    Json(json!({"encdata": format!("enc:{}", form["deviceid"]), "hash": "h+/="}))
}

async fn register(
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let ok = query.get("hash").map(String::as_str) == Some("h+/=")
        && content_type(&headers) == "application/octet-stream"
        && body.as_ref() == b"enc:device-42";
    let reply = if ok {
        r#"{"success":"device-token"}"#
    } else {
        r#"{"reason":"registration rejected"}"#
    };
    // Mislabelled JSON, as some deployments do
    ([(header::CONTENT_TYPE, "text/plain")], reply)
}

async fn login(Query(query): Query<HashMap<String, String>>, headers: HeaderMap) -> impl IntoResponse {
    let bearer = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    if bearer != Some("Bearer device-token") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"reason": "missing device token"})));
    }
    if query.get("password").map(String::as_str) != Some("secret") || query.get("country").map(String::as_str) != Some("IN") {
        return (StatusCode::OK, Json(json!({"reason": "Invalid credentials"})));
    }
    (StatusCode::OK, Json(json!({"success": "session-token"})))
}

fn has_session(headers: &HeaderMap) -> bool {
    headers.get("X-SESSION").and_then(|v| v.to_str().ok()) == Some("session-token")
}

async fn package(
    Path(content_id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    if !has_session(&headers) || content_id != "y8S9aDrzXAPp" || !form.contains_key("packageid") {
        return Json(json!({"reason": "package unavailable"}));
    }
    Json(json!({"success": {"status": "packaged"}}))
}

async fn drm_token(headers: HeaderMap, Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
    if !has_session(&headers) {
        return Json(json!({"reason": "no session"}));
    }
    Json(json!({"success": format!("drm-{}", form["drmscheme"])}))
}

async fn echo(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    Json(json!({
        "content_type": content_type(&headers),
        "custom": headers.get("X-Custom").and_then(|v| v.to_str().ok()),
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn plain() -> &'static str {
    "plain text body"
}

async fn broken_json() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], "{not json")
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "missing")
}

async fn server_error() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"reason": "boom"})))
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "too late"
}

// ============================================================================
// Fixtures
// ============================================================================

#[fixture]
fn test_router() -> Router {
    Router::new()
        .route("/v1/device/encrypt/{provider}", post(encrypt))
        .route("/v1/device/register/{provider}", post(register))
        .route("/v1/login", get(login))
        .route("/v1/content/package/{content_id}", post(package))
        .route("/v1/content/drmtoken", post(drm_token))
        .route("/echo", post(echo))
        .route("/plain", get(plain))
        .route("/broken-json", get(broken_json))
        .route("/error404", get(not_found))
        .route("/error500", get(server_error))
        .route("/slow", get(slow))
}

#[fixture]
async fn test_server(test_router: Router) -> TestServer {
    TestServer::new(test_router).await
}

#[fixture]
fn gateway() -> HttpGateway {
    HttpGateway::new(GatewayOptions::default()).unwrap()
}

fn context_for(server: &TestServer) -> playpass_core::PipelineContext {
    let mut ctx = common::context();
    ctx.endpoints = EndpointConfig::single(server.url("/v1/"));
    ctx
}

// ============================================================================
// Gateway behaviour
// ============================================================================

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_json_response(#[future] test_server: TestServer, gateway: HttpGateway) {
    let server = test_server.await;
    let request = HttpRequest::post(
        server.url("/echo"),
        Body::Form(vec![("a".into(), "1 2".into()), ("b".into(), "&".into())]),
    )
    .with_header("X-Custom", "yes");

    let response = gateway.send(request).await.unwrap();

    let body = match response {
        ParsedResponse::Json(body) => body,
        other => panic!("expected JSON, got {other:?}"),
    };
    assert_eq!(body["content_type"], "application/x-www-form-urlencoded");
    assert_eq!(body["custom"], "yes");
    assert_eq!(body["body"], "a=1+2&b=%26");
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_octet_body(#[future] test_server: TestServer, gateway: HttpGateway) {
    let server = test_server.await;
    let request = HttpRequest::post(server.url("/echo"), Body::Octets(Bytes::from_static(b"raw-bytes")));

    let body = gateway.send(request).await.unwrap().into_json().unwrap();
    assert_eq!(body["content_type"], "application/octet-stream");
    assert_eq!(body["body"], "raw-bytes");
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_non_json_is_raw(#[future] test_server: TestServer, gateway: HttpGateway) {
    let server = test_server.await;
    let response = gateway.send(HttpRequest::get(server.url("/plain"))).await.unwrap();
    assert_eq!(response, ParsedResponse::Raw(Bytes::from_static(b"plain text body")));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_malformed_json(#[future] test_server: TestServer, gateway: HttpGateway) {
    let server = test_server.await;
    let err = gateway
        .send(HttpRequest::get(server.url("/broken-json")))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol { status: None, .. }), "{err:?}");
}

#[rstest]
#[case("/error404", 404)]
#[case("/error500", 500)]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_http_errors(
    #[future] test_server: TestServer,
    gateway: HttpGateway,
    #[case] path: &str,
    #[case] expected_status: u16,
) {
    let server = test_server.await;
    let err = gateway.send(HttpRequest::get(server.url(path))).await.unwrap_err();

    assert_eq!(err.status_code(), Some(expected_status));
    assert!(!err.is_transport());
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_unreachable_host(gateway: HttpGateway) {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{addr}/v1/login")).unwrap();
    let err = gateway.send(HttpRequest::get(url)).await.unwrap_err();
    assert!(err.is_transport(), "{err:?}");
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_client_timeout(#[future] test_server: TestServer) {
    let server = test_server.await;
    let gateway = HttpGateway::new(GatewayOptions {
        request_timeout: Duration::from_millis(200),
        ..GatewayOptions::default()
    })
    .unwrap();

    let err = gateway.send(HttpRequest::get(server.url("/slow"))).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "{err:?}");
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_timeout_layer(#[future] test_server: TestServer, gateway: HttpGateway) {
    let server = test_server.await;
    let gateway = gateway.with_timeout(Duration::from_millis(200));

    let err = gateway.send(HttpRequest::get(server.url("/slow"))).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { after } if after == Duration::from_millis(200)));
}

// ============================================================================
// Full pipeline over HTTP
// ============================================================================

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_pipeline_over_http(#[future] test_server: TestServer, gateway: HttpGateway) {
    let server = test_server.await;

    let result = Pipeline::new(gateway, context_for(&server)).run().await.unwrap();

    assert_eq!(result.drm_token.expose(), "drm-WIDEVINE");
    assert_eq!(result.session_token.expose(), "session-token");
    assert_eq!(result.manifest_url, None);
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_pipeline_over_http_bad_password(#[future] test_server: TestServer, gateway: HttpGateway) {
    let server = test_server.await;
    let mut ctx = context_for(&server);
    ctx.credentials.password = "wrong".into();

    let err = Pipeline::new(gateway, ctx).run().await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Login));
    assert!(err.to_string().contains("Invalid credentials"));
    // The password travels in the query; it must not leak into errors
    assert!(!err.to_string().contains("wrong"));
}

#[rstest]
#[timeout(Duration::from_secs(5))]
#[tokio::test]
async fn test_pipeline_stops_on_http_status(#[future] test_server: TestServer) {
    let server = test_server.await;
    let mut ctx = context_for(&server);
    // Registration and login now hit routes that answer 404
    ctx.endpoints.subscriber_base = server.url("/missing/");

    let gateway: Box<dyn Gateway> = Box::new(HttpGateway::new(GatewayOptions::default()).unwrap());
    let err = Pipeline::new(gateway, ctx).run().await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Register));
    assert_eq!(err.status_code(), Some(404));
}
