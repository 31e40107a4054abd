use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::{Value, json};
use tower::ServiceExt;

use copydesk::anthropic::Anthropic;
use copydesk::client::{ChatClient, ClientConfig};
use copydesk::config::{MAX_TOKENS, MODEL, RelayConfig, TEMPERATURE};
use copydesk::prompt::SYSTEM_PROMPT;
use copydesk::protocol::StreamEvent;
use copydesk::server::{AppState, router};

fn app(upstream_url: &str, api_key: &str) -> Router {
    let anthropic = Anthropic::new(RelayConfig::new(api_key)).with_base_url(upstream_url);
    router(AppState::new(anthropic))
}

async fn post_chat(app: Router, body: &str) -> axum::http::Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn sse_event(event: &str, data: &str) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}

fn delta_event(text: &str) -> String {
    sse_event(
        "content_block_delta",
        &json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": text},
        })
        .to_string(),
    )
}

fn upstream_stream(fragments: &[&str]) -> String {
    let mut body = String::new();
    body.push_str(&sse_event(
        "message_start",
        "{\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"role\":\"assistant\"}}",
    ));
    body.push_str(&sse_event("ping", "{\"type\":\"ping\"}"));
    body.push_str(&sse_event(
        "content_block_start",
        "{\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\"}}",
    ));
    for fragment in fragments {
        body.push_str(&delta_event(fragment));
    }
    body.push_str(&sse_event(
        "content_block_stop",
        "{\"type\":\"content_block_stop\",\"index\":0}",
    ));
    body.push_str(&sse_event(
        "message_delta",
        "{\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}",
    ));
    body.push_str(&sse_event("message_stop", "{\"type\":\"message_stop\"}"));
    body
}

#[tokio::test]
async fn malformed_json_body_is_a_500() {
    let response = post_chat(app("http://unused.invalid", "test-key"), "not json").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Error processing your request");
    assert_eq!(body["details"], "Invalid messages format");
}

#[tokio::test]
async fn missing_messages_field_is_a_500() {
    let response = post_chat(app("http://unused.invalid", "test-key"), "{\"history\":[]}").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["details"], "Invalid messages format");
}

#[tokio::test]
async fn non_array_messages_field_is_a_500() {
    let response =
        post_chat(app("http://unused.invalid", "test-key"), "{\"messages\":\"hi\"}").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["details"], "Invalid messages format");
}

#[tokio::test]
async fn missing_api_key_fails_before_the_upstream_call() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(200).body("");
        })
        .await;

    let response = post_chat(
        app(&server.base_url(), ""),
        "{\"messages\":[{\"role\":\"user\",\"content\":\"hi\"}]}",
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["details"], "ANTHROPIC_API_KEY is not set");
    upstream.assert_calls(0);
}

#[tokio::test]
async fn upstream_request_carries_the_normalized_conversation() {
    let server = MockServer::start_async().await;
    let upstream = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "test-key")
                .header("anthropic-version", "2023-06-01")
                .json_body(json!({
                    "model": MODEL,
                    "max_tokens": MAX_TOKENS,
                    "temperature": TEMPERATURE,
                    "system": SYSTEM_PROMPT,
                    "messages": [
                        {"role": "user", "content": "write me a tagline"},
                        {"role": "assistant", "content": "Sure."},
                    ],
                    "stream": true,
                }));
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(upstream_stream(&["ok"]));
        })
        .await;

    // Blank entries are dropped, content is trimmed, and any role other
    // than "user" is coerced to "assistant".
    let response = post_chat(
        app(&server.base_url(), "test-key"),
        &json!({
            "messages": [
                {"role": "user", "content": "  write me a tagline  "},
                {"role": "user", "content": "   "},
                {"role": "user"},
                {"role": "system", "content": "Sure."},
            ]
        })
        .to_string(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let _ = response.into_body().collect().await.unwrap();
    upstream.assert_calls(1);
}

#[tokio::test]
async fn fragments_relay_in_order_and_end_with_done() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(upstream_stream(&["Hello", " world"]));
        })
        .await;

    let response = post_chat(
        app(&server.base_url(), "test-key"),
        "{\"messages\":[{\"role\":\"user\",\"content\":\"hi\"}]}",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.headers().get("cache-control").unwrap(), "no-cache");
    assert_eq!(response.headers().get("connection").unwrap(), "keep-alive");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        bytes,
        "data: {\"content\":\"Hello\"}\n\n\
         data: {\"content\":\" world\"}\n\n\
         data: {\"content\":\"[DONE]\"}\n\n"
    );
}

#[tokio::test]
async fn midstream_failure_emits_one_error_frame_and_no_done() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            let mut body = delta_event("partial");
            body.push_str(&sse_event(
                "error",
                "{\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\
                 \"message\":\"Overloaded\"}}",
            ));
            when.method(POST).path("/v1/messages");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(body);
        })
        .await;

    let response = post_chat(
        app(&server.base_url(), "test-key"),
        "{\"messages\":[{\"role\":\"user\",\"content\":\"hi\"}]}",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        bytes,
        "data: {\"content\":\"partial\"}\n\n\
         data: {\"error\":\"Overloaded\"}\n\n"
    );
}

#[tokio::test]
async fn upstream_rejection_is_a_500_with_the_api_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(401).body("{\"error\":\"invalid x-api-key\"}");
        })
        .await;

    let response = post_chat(
        app(&server.base_url(), "bad-key"),
        "{\"messages\":[{\"role\":\"user\",\"content\":\"hi\"}]}",
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Error processing your request");
    let details = body["details"].as_str().unwrap();
    assert!(details.starts_with("API error: 401"), "details: {details}");
}

#[tokio::test]
async fn chat_client_decodes_relay_events() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(
                    "data: {\"content\":\"Hi\"}\n\n\
                     data: {\"content\":\"[DONE]\"}\n\n",
                );
        })
        .await;

    let client = ChatClient::new(ClientConfig {
        base_url: server.base_url(),
    });

    let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = events.clone();
    client
        .stream_chat(&[], move |event| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(event);
            }
        })
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![StreamEvent::Content("Hi".to_string()), StreamEvent::Done]
    );
}

#[tokio::test]
async fn chat_client_surfaces_relay_error_details() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(500).json_body(json!({
                "error": "Error processing your request",
                "details": "ANTHROPIC_API_KEY is not set",
            }));
        })
        .await;

    let client = ChatClient::new(ClientConfig {
        base_url: server.base_url(),
    });

    let err = client
        .stream_chat(&[], |_event| async {})
        .await
        .unwrap_err();
    assert!(err.to_string().contains("ANTHROPIC_API_KEY is not set"));
}
