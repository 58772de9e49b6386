//! Retry envelope behavior against a mock gateway.

use inference_gateway_sdk::{CancellationToken, Client, Error, RetryConfig};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn models_body() -> serde_json::Value {
    json!({
        "object": "list",
        "data": []
    })
}

fn error_body() -> serde_json::Value {
    json!({"error": "Server error"})
}

fn client_with_retry(server: &MockServer, retry: RetryConfig) -> Client {
    Client::builder()
        .base_url(server.uri())
        .retry_config(retry)
        .build()
        .expect("client builds")
}

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_backoff: Duration::from_millis(20),
        max_backoff: Duration::from_millis(200),
        ..RetryConfig::default()
    }
}

#[tokio::test]
async fn succeeds_after_transient_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500).set_body_json(error_body()))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(models_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_retry(&server, fast_retry(3));
    let models = client.list_models().await.expect("third attempt succeeds");
    assert_eq!(models.object, "list");
}

#[tokio::test]
async fn exhausts_attempt_budget_and_surfaces_last_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500).set_body_json(error_body()))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_with_retry(&server, fast_retry(3));
    let err = client.list_models().await.expect_err("all attempts fail");
    assert_eq!(err.status_code(), Some(500));
    assert!(err.to_string().contains("Server error"));
}

#[tokio::test]
async fn does_not_retry_client_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid request"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_retry(&server, fast_retry(5));
    let err = client.list_models().await.expect_err("400 is terminal");
    assert_eq!(err.status_code(), Some(400));
}

#[tokio::test]
async fn disabled_retries_make_exactly_one_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500).set_body_json(error_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_retry(&server, RetryConfig::disabled());
    let err = client.list_models().await.expect_err("single attempt fails");
    assert_eq!(err.status_code(), Some(500));
}

#[tokio::test]
async fn retry_after_header_overrides_exponential_backoff() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0.5")
                .set_body_json(json!({"error": "Rate limited"})),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(models_body()))
        .expect(1)
        .mount(&server)
        .await;

    // Exponential backoff would wait 10 seconds; the header wins.
    let client = client_with_retry(
        &server,
        RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(10),
            ..RetryConfig::default()
        },
    );

    let start = Instant::now();
    client.list_models().await.expect("second attempt succeeds");
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(450), "waited {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "waited {elapsed:?}");
}

#[tokio::test]
async fn on_retry_observer_sees_each_wait() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500).set_body_json(error_body()))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(models_body()))
        .expect(1)
        .mount(&server)
        .await;

    let calls: Arc<Mutex<Vec<(u32, String, Duration)>>> = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&calls);

    let client = client_with_retry(
        &server,
        RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(30),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            on_retry: Some(Arc::new(move |attempt, error, delay| {
                observed
                    .lock()
                    .expect("observer lock")
                    .push((attempt, error.to_string(), delay));
            })),
            ..RetryConfig::default()
        },
    );

    client.list_models().await.expect("third attempt succeeds");

    let calls = calls.lock().expect("observer lock");
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, 1);
    assert!(calls[0].1.contains("500"));
    assert_eq!(calls[0].2, Duration::from_millis(30));
    assert_eq!(calls[1].0, 2);
    assert_eq!(calls[1].2, Duration::from_millis(60));
}

#[tokio::test]
async fn custom_retryable_status_codes_replace_the_default_set() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(418).set_body_json(error_body()))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(models_body()))
        .expect(1)
        .mount(&server)
        .await;

    let custom = RetryConfig {
        retryable_status_codes: vec![418, 503],
        ..fast_retry(3)
    };
    let client = client_with_retry(&server, custom);
    client.list_models().await.expect("418 retried, then 200");
}

#[tokio::test]
async fn custom_retryable_status_codes_make_500_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500).set_body_json(error_body()))
        .expect(1)
        .mount(&server)
        .await;

    let custom = RetryConfig {
        retryable_status_codes: vec![418, 503],
        ..fast_retry(3)
    };
    let client = client_with_retry(&server, custom);
    let err = client.list_models().await.expect_err("500 not in custom set");
    assert_eq!(err.status_code(), Some(500));
}

#[tokio::test]
async fn cancellation_aborts_the_backoff_wait() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(500).set_body_json(error_body()))
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let client = client_with_retry(
        &server,
        RetryConfig {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(30),
            ..RetryConfig::default()
        },
    )
    .with_cancellation(token.clone());

    let start = Instant::now();
    let handle = tokio::spawn(async move { client.list_models().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let result = handle.await.expect("task joins");
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn transport_errors_are_retried_until_exhaustion() {
    // Nothing listens on this port; every attempt is a connection failure.
    let client = Client::builder()
        .base_url("http://127.0.0.1:9")
        .retry_config(fast_retry(3))
        .build()
        .expect("client builds");

    let err = client.list_models().await.expect_err("nothing listening");
    assert!(
        matches!(err, Error::Connection { .. } | Error::Http(_)),
        "unexpected error: {err:?}"
    );
}
