use super::server::{local_base_url, RelayServer, RelayServerBuilder};
use super::upstream::{GroqChatClient, VisionModel, MODEL};
use crate::analysis::{AnalysisClient, RelayClient};
use crate::config::RelayConfig;
use crate::error::{AnalysisError, RelayError};
use crate::events::EventBus;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    routing::post,
    Json, Router,
};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Upstream stand-in answering with a fixed outcome
struct StubModel {
    outcome: Result<String, String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubModel {
    fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl VisionModel for StubModel {
    async fn describe(&self, image_data_url: &str, query: &str) -> Result<String, RelayError> {
        self.calls
            .lock()
            .push((image_data_url.to_string(), query.to_string()));
        self.outcome.clone().map_err(|details| RelayError::Upstream { details })
    }
}

fn test_config() -> RelayConfig {
    RelayConfig {
        ip: "127.0.0.1".to_string(),
        port: 3000,
        upstream_url: "http://127.0.0.1:9/unused".to_string(),
        api_key_env: "GROQ_API".to_string(),
        request_timeout_seconds: 5,
        body_limit_mb: 1,
    }
}

fn server_with(model: Arc<StubModel>) -> RelayServer {
    RelayServer::new(test_config(), model, Arc::new(EventBus::new(16)))
}

fn analyze_request(body: Value) -> Request<Body> {
    let body = body.to_string();
    Request::builder()
        .method("POST")
        .uri("/api/analyze-image")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_analyze_success() {
    let model = StubModel::answering("A person walking.");
    let app = server_with(Arc::clone(&model)).router();

    let response = app
        .oneshot(analyze_request(json!({
            "imageDataUrl": "data:image/jpeg;base64,/9j/",
            "query": "What is happening?"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"result": "A person walking."}));

    let calls = model.calls.lock().clone();
    assert_eq!(
        calls,
        vec![(
            "data:image/jpeg;base64,/9j/".to_string(),
            "What is happening?".to_string()
        )]
    );
}

#[tokio::test]
async fn test_missing_query_rejected() {
    let model = StubModel::answering("unused");
    let app = server_with(Arc::clone(&model)).router();

    let response = app
        .oneshot(analyze_request(json!({
            "imageDataUrl": "data:image/jpeg;base64,/9j/"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Image data and query are required"})
    );
    assert!(model.calls.lock().is_empty());
}

#[tokio::test]
async fn test_empty_image_rejected() {
    let app = server_with(StubModel::answering("unused")).router();

    let response = app
        .oneshot(analyze_request(json!({"imageDataUrl": "", "query": "describe"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let app = server_with(StubModel::answering("unused")).router();

    let request = Request::builder()
        .method("POST")
        .uri("/api/analyze-image")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Image data and query are required"})
    );
}

#[tokio::test]
async fn test_upstream_error_passed_through() {
    let app = server_with(StubModel::failing("Rate limit reached for model")).router();

    let response = app
        .oneshot(analyze_request(json!({
            "imageDataUrl": "data:image/jpeg;base64,/9j/",
            "query": "describe"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Rate limit reached for model"})
    );
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let app = server_with(StubModel::answering("unused")).router();

    let image = format!("data:image/jpeg;base64,{}", "A".repeat(2 * 1024 * 1024));
    let response = app
        .oneshot(analyze_request(json!({"imageDataUrl": image, "query": "describe"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_health() {
    let app = server_with(StubModel::answering("unused")).router();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], super::MODEL);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = server_with(StubModel::answering("unused")).router();

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[test]
fn test_builder_validation() {
    let result = RelayServerBuilder::new()
        .model(StubModel::answering("unused"))
        .build();
    assert!(result.is_err());

    let result = RelayServerBuilder::new().config(test_config()).build();
    assert!(result.is_err());

    let server = RelayServerBuilder::new()
        .config(test_config())
        .model(StubModel::answering("unused"))
        .build()
        .unwrap();
    assert_eq!(server.address(), "127.0.0.1:3000");
}

#[tokio::test]
async fn test_bind_failure_reported() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let mut config = test_config();
    config.port = port;
    let server = RelayServer::new(
        config,
        StubModel::answering("unused"),
        Arc::new(EventBus::new(16)),
    );

    let err = server.serve(async {}).await.unwrap_err();
    assert!(matches!(
        err,
        crate::error::StereocamError::Relay(RelayError::BindFailed { .. })
    ));
}

#[test]
fn test_local_base_url() {
    let wildcard: SocketAddr = "0.0.0.0:3000".parse().unwrap();
    assert_eq!(local_base_url(wildcard), "http://127.0.0.1:3000");

    let wildcard_v6: SocketAddr = "[::]:8080".parse().unwrap();
    assert_eq!(local_base_url(wildcard_v6), "http://[::1]:8080");

    let specific: SocketAddr = "192.168.1.5:80".parse().unwrap();
    assert_eq!(local_base_url(specific), "http://192.168.1.5:80");
}

const UPSTREAM_PATH: &str = "/openai/v1/chat/completions";
const IMAGE: &str = "data:image/jpeg;base64,/9j/";

/// Chat completions endpoint answering every request with a fixed status and body
#[derive(Clone)]
struct UpstreamStub {
    status: StatusCode,
    body: Value,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn upstream_handler(
    State(stub): State<UpstreamStub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    stub.seen.lock().push((auth, body));
    (stub.status, Json(stub.body.clone()))
}

async fn spawn_router(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn spawn_upstream(
    status: StatusCode,
    body: Value,
) -> (String, Arc<Mutex<Vec<(Option<String>, Value)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let stub = UpstreamStub {
        status,
        body,
        seen: Arc::clone(&seen),
    };
    let app = Router::new()
        .route(UPSTREAM_PATH, post(upstream_handler))
        .with_state(stub);
    let addr = spawn_router(app).await;
    (format!("http://{}{}", addr, UPSTREAM_PATH), seen)
}

fn completion(text: &str) -> Value {
    json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
}

fn groq_client(url: &str) -> GroqChatClient {
    GroqChatClient::new(url, Some("test-key".to_string()), Duration::from_secs(5)).unwrap()
}

/// Bind a relay on an ephemeral port in front of `model` and return its base URL
async fn spawn_relay(model: Arc<dyn VisionModel>) -> String {
    let mut config = test_config();
    config.port = 0;
    let server = RelayServer::new(config, model, Arc::new(EventBus::new(16)));

    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        server
            .serve_on(listener, std::future::pending::<()>())
            .await
            .unwrap();
    });
    local_base_url(addr)
}

#[tokio::test]
async fn test_groq_client_sends_bearer_and_reads_content() {
    let (url, seen) = spawn_upstream(StatusCode::OK, completion("A person walking.")).await;

    let result = groq_client(&url)
        .describe(IMAGE, "What is happening?")
        .await
        .unwrap();
    assert_eq!(result, "A person walking.");

    let seen = seen.lock().clone();
    assert_eq!(seen.len(), 1);
    let (auth, body) = &seen[0];
    assert_eq!(auth.as_deref(), Some("Bearer test-key"));
    assert_eq!(body["model"], MODEL);
    assert_eq!(body["messages"][0]["content"][0]["text"], "What is happening?");
    assert_eq!(body["messages"][0]["content"][1]["image_url"]["url"], IMAGE);
}

#[tokio::test]
async fn test_groq_client_surfaces_upstream_error_message() {
    let (url, _seen) = spawn_upstream(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"message": "Rate limit reached", "type": "tokens"}}),
    )
    .await;

    let err = groq_client(&url).describe(IMAGE, "describe").await.unwrap_err();
    assert!(matches!(
        err,
        RelayError::Upstream { ref details } if details == "Rate limit reached"
    ));
}

#[tokio::test]
async fn test_groq_client_unrecognized_error_body() {
    let (url, _seen) =
        spawn_upstream(StatusCode::SERVICE_UNAVAILABLE, json!({"detail": "down"})).await;

    let err = groq_client(&url).describe(IMAGE, "describe").await.unwrap_err();
    match err {
        RelayError::Upstream { details } => {
            assert!(details.starts_with("503 "));
            assert!(details.contains("down"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_groq_client_content_missing() {
    let (url, _seen) = spawn_upstream(StatusCode::OK, json!({"choices": []})).await;

    let result = groq_client(&url).describe(IMAGE, "describe").await.unwrap();
    assert_eq!(result, "No analysis available");
}

#[tokio::test]
async fn test_relay_client_end_to_end() {
    let (url, seen) = spawn_upstream(StatusCode::OK, completion("A person walking.")).await;
    let relay_url = spawn_relay(Arc::new(groq_client(&url))).await;

    let client = RelayClient::new(&relay_url, Duration::from_secs(5)).unwrap();
    let result = client.analyze(IMAGE, "What is happening?").await.unwrap();

    assert_eq!(result, "A person walking.");
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_relay_client_sees_upstream_error_verbatim() {
    let (url, _seen) = spawn_upstream(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"message": "Rate limit reached"}}),
    )
    .await;
    let relay_url = spawn_relay(Arc::new(groq_client(&url))).await;

    let client = RelayClient::new(&relay_url, Duration::from_secs(5)).unwrap();
    let err = client.analyze(IMAGE, "describe").await.unwrap_err();

    assert_eq!(
        err,
        AnalysisError::Endpoint {
            status: 500,
            message: "Rate limit reached".to_string(),
        }
    );
}

#[tokio::test]
async fn test_relay_client_missing_query() {
    let model = StubModel::answering("unused");
    let relay_url = spawn_relay(Arc::clone(&model) as Arc<dyn VisionModel>).await;

    let client = RelayClient::new(&relay_url, Duration::from_secs(5)).unwrap();
    let err = client.analyze(IMAGE, "").await.unwrap_err();

    assert_eq!(
        err,
        AnalysisError::Endpoint {
            status: 400,
            message: "Image data and query are required".to_string(),
        }
    );
    assert!(model.calls.lock().is_empty());
}

#[tokio::test]
async fn test_relay_client_rejects_malformed_responses() {
    let app = Router::new()
        .route("/ok/api/analyze-image", post(|| async { "not json" }))
        .route(
            "/down/api/analyze-image",
            post(|| async { (StatusCode::BAD_GATEWAY, "bad gateway") }),
        );
    let addr = spawn_router(app).await;

    let client = RelayClient::new(&format!("http://{}/ok", addr), Duration::from_secs(5)).unwrap();
    match client.analyze(IMAGE, "describe").await.unwrap_err() {
        AnalysisError::Request { details } => {
            assert!(details.starts_with("malformed relay response"))
        }
        other => panic!("unexpected error {:?}", other),
    }

    let client =
        RelayClient::new(&format!("http://{}/down", addr), Duration::from_secs(5)).unwrap();
    assert_eq!(
        client.analyze(IMAGE, "describe").await.unwrap_err(),
        AnalysisError::Endpoint {
            status: 502,
            message: "bad gateway".to_string(),
        }
    );
}
