//! GeminiClient against a local stand-in for the generateContent API

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use kinsketch::gemini::test_utils::{png_reply, sample_png};
use kinsketch::gemini::{GeminiClient, RemoteError, TextGenerator};
use kinsketch::images::{generate_image, ConversationTurn, GenerateError, GenerateOptions};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// What the fake endpoint answers with
#[derive(Clone)]
enum Behaviour {
    Text(String),
    Blocked,
    QuotaExceeded,
    Slow(Duration),
}

#[derive(Clone)]
struct FakeGemini {
    behaviour: Behaviour,
    requests: Arc<Mutex<Vec<(String, String, Value)>>>,
}

async fn generate_content(
    State(fake): State<FakeGemini>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    fake.requests.lock().push((model_action, key, body));

    match fake.behaviour {
        Behaviour::Text(text) => (
            StatusCode::OK,
            Json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": text }] },
                    "finishReason": "STOP"
                }]
            })),
        ),
        Behaviour::Blocked => (
            StatusCode::OK,
            Json(json!({ "promptFeedback": { "blockReason": "SAFETY" } })),
        ),
        Behaviour::QuotaExceeded => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": {
                    "code": 429,
                    "message": "Resource has been exhausted (e.g. check quota).",
                    "status": "RESOURCE_EXHAUSTED"
                }
            })),
        ),
        Behaviour::Slow(delay) => {
            tokio::time::sleep(delay).await;
            (StatusCode::OK, Json(json!({ "candidates": [] })))
        }
    }
}

/// Serve the fake API on a random port
async fn spawn_fake(behaviour: Behaviour) -> (SocketAddr, FakeGemini) {
    let fake = FakeGemini {
        behaviour,
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/v1beta/models/{model_action}", post(generate_content))
        .with_state(fake.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (addr, fake)
}

/// Answer every request with headers and half a body, then go quiet
async fn spawn_stalled_body() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let head = "HTTP/1.1 200 OK\r\n\
                            content-type: application/json\r\n\
                            content-length: 1000\r\n\r\n\
                            {\"candidates\":[";
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(10)).await;
            });
        }
    });
    addr
}

fn client_for(addr: SocketAddr, timeout: Duration) -> GeminiClient {
    GeminiClient::new(format!("http://{}/v1beta", addr), timeout).unwrap()
}

#[tokio::test]
async fn test_bridge_decodes_image_from_live_response() {
    let (bitmap, png) = sample_png(8, 8);
    let (addr, fake) = spawn_fake(Behaviour::Text(png_reply(&png))).await;
    let client = client_for(addr, Duration::from_secs(5));

    let history = vec![
        ConversationTurn::user("we baked mooncakes together"),
        ConversationTurn::assistant("lovely"),
        ConversationTurn::user("and watched the full moon"),
    ];
    let options = GenerateOptions::default().with_window_size(2);

    let generated = generate_image(&client, &history, "live-key", &options)
        .await
        .unwrap();
    assert_eq!(generated.image.to_rgba8(), bitmap);
    assert_eq!(generated.prompt, "and watched the full moon");

    let requests = fake.requests.lock().clone();
    assert_eq!(requests.len(), 1);
    let (model_action, key, body) = &requests[0];
    assert_eq!(model_action, "gemini-1.5-flash:generateContent");
    assert_eq!(key, "live-key");
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.starts_with("assistant: lovely\nuser: and watched the full moon\n\n"));
    assert!(!prompt.contains("mooncakes"));
}

#[tokio::test]
async fn test_blocked_prompt_is_empty_response() {
    let (addr, _fake) = spawn_fake(Behaviour::Blocked).await;
    let client = client_for(addr, Duration::from_secs(5));

    let text = client
        .generate_text("key", "gemini-1.5-flash", "prompt")
        .await
        .unwrap();
    assert!(text.is_none());

    let result = generate_image(
        &client,
        &[ConversationTurn::user("hi")],
        "key",
        &GenerateOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(GenerateError::EmptyResponse)));
}

#[tokio::test]
async fn test_quota_error_is_remote_api() {
    let (addr, _fake) = spawn_fake(Behaviour::QuotaExceeded).await;
    let client = client_for(addr, Duration::from_secs(5));

    let err = client
        .generate_text("key", "gemini-1.5-flash", "prompt")
        .await
        .unwrap_err();
    match &err {
        RemoteError::Api(msg) => {
            assert!(msg.contains("429"));
            assert!(msg.contains("RESOURCE_EXHAUSTED"));
        }
        other => panic!("expected API error, got {:?}", other),
    }

    let result = generate_image(
        &client,
        &[ConversationTurn::user("hi")],
        "key",
        &GenerateOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(GenerateError::RemoteApi(_))));
}

#[tokio::test]
async fn test_timeout_is_network_error() {
    let (addr, _fake) = spawn_fake(Behaviour::Slow(Duration::from_secs(3))).await;
    let client = client_for(addr, Duration::from_millis(200));

    let result = generate_image(
        &client,
        &[ConversationTurn::user("hi")],
        "key",
        &GenerateOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(GenerateError::Network(_))));
}

#[tokio::test]
async fn test_stalled_body_is_network_error() {
    let addr = spawn_stalled_body().await;
    let client = client_for(addr, Duration::from_millis(500));

    let err = client
        .generate_text("key", "gemini-1.5-flash", "prompt")
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Connectivity(_)), "got {:?}", err);

    let result = generate_image(
        &client,
        &[ConversationTurn::user("hi")],
        "key",
        &GenerateOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(GenerateError::Network(_))));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = client_for(addr, Duration::from_secs(2));

    let result = generate_image(
        &client,
        &[ConversationTurn::user("hi")],
        "key",
        &GenerateOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(GenerateError::Network(_))));
}
