//! Streaming behavior against a mock gateway.

use futures::StreamExt;
use inference_gateway_sdk::{
    CancellationToken, Client, Error, EventKind, Message, Provider, RetryConfig, SseFraming,
};
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chunk(content: &str, finish_reason: Option<&str>) -> String {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion.chunk",
        "created": 1698819810,
        "model": "llama2",
        "choices": [{
            "delta": {"content": content},
            "index": 0,
            "finish_reason": finish_reason
        }]
    })
    .to_string()
}

fn sse_body(chunks: &[String]) -> Vec<u8> {
    let mut body = String::new();
    for c in chunks {
        body.push_str(&format!("data: {c}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}

fn client_for(server: &MockServer) -> Client {
    Client::builder()
        .base_url(server.uri())
        .build()
        .expect("client builds")
}

#[tokio::test]
async fn events_arrive_in_input_order_and_the_stream_closes() {
    let server = MockServer::start().await;

    let body = sse_body(&[
        chunk("Go", None),
        chunk(" is", None),
        chunk(" amazing", Some("stop")),
    ]);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(query_param("provider", "ollama"))
        .and(body_partial_json(json!({"model": "llama2", "stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut events = client_for(&server)
        .generate_content_stream(
            Provider::Ollama,
            "llama2",
            vec![
                Message::system("You are a helpful assistant."),
                Message::user("What is Go?"),
            ],
        )
        .await
        .expect("stream starts");

    let mut content = String::new();
    let mut count = 0;
    let mut stream_end_seen = false;

    while let Some(event) = events.next().await {
        count += 1;
        match event.event {
            Some(EventKind::ContentDelta) => {
                content.push_str(event.chunk().expect("chunk decodes").content());
            }
            Some(EventKind::StreamEnd) => stream_end_seen = true,
            other => panic!("unexpected event kind: {other:?}"),
        }
    }

    assert_eq!(content, "Go is amazing");
    assert_eq!(count, 4);
    assert!(stream_end_seen);
    assert!(events.next().await.is_none());
}

#[tokio::test]
async fn record_framed_streams_carry_typed_events() {
    let server = MockServer::start().await;

    let body = concat!(
        "event: message-start\n",
        "data: {\"role\":\"assistant\"}\n",
        "\n",
        "event: stream-end\n",
        "\n",
    )
    .as_bytes()
    .to_vec();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .sse_framing(SseFraming::Records)
        .build()
        .expect("client builds");

    let mut events = client
        .generate_content_stream(Provider::Anthropic, "claude", vec![Message::user("Hi")])
        .await
        .expect("stream starts");

    let first = events.next().await.expect("first event");
    assert_eq!(first.event, Some(EventKind::MessageStart));
    assert_eq!(first.data_str(), Some("{\"role\":\"assistant\"}"));

    let second = events.next().await.expect("second event");
    assert!(second.is_stream_end());
    assert!(second.data.is_none());

    assert!(events.next().await.is_none());
}

#[tokio::test]
async fn collect_content_concatenates_all_deltas() {
    let server = MockServer::start().await;

    let body = sse_body(&[chunk("Hello", None), chunk(", world!", Some("stop"))]);

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let events = client_for(&server)
        .generate_content_stream(Provider::Ollama, "llama2", vec![Message::user("Hi")])
        .await
        .expect("stream starts");

    let content = events.collect_content().await.expect("collects content");
    assert_eq!(content, "Hello, world!");
}

#[tokio::test]
async fn handshake_errors_are_returned_before_any_event() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": "Invalid model for streaming"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .generate_content_stream(Provider::Groq, "invalid-model", vec![Message::user("Hi")])
        .await
        .expect_err("handshake fails");

    assert_eq!(err.status_code(), Some(400));
    assert!(err.to_string().contains("Invalid model for streaming"));
}

#[tokio::test]
async fn handshake_is_retried_like_any_other_operation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "warming up"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    let body = sse_body(&[chunk("ready", Some("stop"))]);
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .retry_config(RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(20),
            ..RetryConfig::default()
        })
        .build()
        .expect("client builds");

    let events = client
        .generate_content_stream(Provider::Ollama, "llama2", vec![Message::user("Hi")])
        .await
        .expect("second handshake succeeds");

    assert_eq!(events.collect_content().await.expect("collects"), "ready");
}

#[tokio::test]
async fn cancellation_aborts_a_slow_handshake() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(30))
                .set_body_raw(sse_body(&[]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let client = client_for(&server).with_cancellation(token.clone());

    let start = Instant::now();
    let handle = tokio::spawn(async move {
        client
            .generate_content_stream(Provider::Ollama, "llama2", vec![Message::user("Hi")])
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let result = handle.await.expect("task joins");
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn streaming_requires_messages() {
    let server = MockServer::start().await;

    let err = client_for(&server)
        .generate_content_stream(Provider::Ollama, "llama2", vec![])
        .await
        .expect_err("empty conversation is rejected");

    assert!(matches!(err, Error::InvalidRequest { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}
