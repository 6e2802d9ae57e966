//! Integration tests for the retry-aware relay transport, against a mock
//! relay endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use studyspark::attach::Attachment;
use studyspark::config::RelayConfig;
use studyspark::history::HistoryBuffer;
use studyspark::relay::{RelayClient, RelayError, RequestBundle};

fn test_client(server: &MockServer) -> RelayClient {
    RelayClient::new(&RelayConfig {
        endpoint: format!("{}/ask", server.uri()),
        max_attempts: 3,
        retry_delay_ms: 20,
    })
}

#[tokio::test]
async fn succeeds_on_third_attempt_with_distinct_status_lines() {
    let mock_server = MockServer::start().await;
    let request_count = Arc::new(AtomicUsize::new(0));
    let counter = request_count.clone();

    // Fails twice, then answers
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = counter.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "text": "The answer is 4." }))
            }
        })
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let mut history = HistoryBuffer::new();
    let bundle =
        RequestBundle::compose("what is 2+2?", &history.to_json().unwrap(), None).unwrap();

    let mut statuses = Vec::new();
    let reply = client.ask(&bundle, |s| statuses.push(s)).await.unwrap();

    assert_eq!(reply, "The answer is 4.");
    assert_eq!(request_count.load(Ordering::SeqCst), 3);
    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].contains("Attempt 1"));
    assert!(statuses[1].contains("Attempt 2"));
    assert_ne!(statuses[0], statuses[1]);

    // One successful cycle records exactly one exchange
    history.record_exchange(bundle.prompt(), &reply);
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn gives_up_after_three_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let history = HistoryBuffer::new();
    let bundle = RequestBundle::compose("hello", &history.to_json().unwrap(), None).unwrap();

    let mut statuses = Vec::new();
    let err = client.ask(&bundle, |s| statuses.push(s)).await.unwrap_err();

    assert!(matches!(err, RelayError::Status(s) if s.as_u16() == 500));
    // Two retry notices plus the terminal one
    assert_eq!(statuses.len(), 3);
    assert!(statuses[2].contains("Giving up"));
    // A failed cycle never touches history
    assert!(history.is_empty());
}

#[tokio::test]
async fn relay_error_payload_takes_the_retry_path() {
    let mock_server = MockServer::start().await;

    // HTTP 200, but the relay reports an application error (OCR or
    // completion failure) — treated the same as a transport failure
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "error": "OCR engine crashed" })),
        )
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let bundle = RequestBundle::compose("read this", "[]", None).unwrap();

    let err = client.ask(&bundle, |_| {}).await.unwrap_err();
    assert!(matches!(err, RelayError::Relay(ref m) if m == "OCR engine crashed"));
}

#[tokio::test]
async fn malformed_payload_takes_the_retry_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_string("this is not json"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let bundle = RequestBundle::compose("hello", "[]", None).unwrap();

    let err = client.ask(&bundle, |_| {}).await.unwrap_err();
    assert!(matches!(err, RelayError::Malformed(_)));
}

#[tokio::test]
async fn missing_text_field_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let bundle = RequestBundle::compose("hello", "[]", None).unwrap();

    let err = client.ask(&bundle, |_| {}).await.unwrap_err();
    assert!(matches!(err, RelayError::Malformed(_)));
}

#[tokio::test]
async fn request_carries_prompt_history_and_file_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": "ok" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let mut history = HistoryBuffer::new();
    history.record_exchange("earlier question", "earlier answer");
    let attachment = Attachment {
        file_name: "homework.png".to_string(),
        bytes: vec![0x89, 0x50, 0x4E, 0x47],
    };
    let bundle = RequestBundle::compose(
        "solve problem 3",
        &history.to_json().unwrap(),
        Some(attachment),
    )
    .unwrap();

    client.ask(&bundle, |_| {}).await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"prompt\""));
    assert!(body.contains("solve problem 3"));
    assert!(body.contains("name=\"history\""));
    assert!(body.contains("earlier question"));
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("homework.png"));
}

#[tokio::test]
async fn empty_submission_issues_zero_network_calls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    // Nothing to send: no bundle, so no transport call is ever made
    assert!(RequestBundle::compose("", "[]", None).is_none());

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.is_empty());
}
