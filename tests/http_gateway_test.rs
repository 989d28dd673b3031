//! Live-mode dispatch against a mock gateway.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sms_dispatcher::{
    verify_auth_header, DispatchStatus, Dispatcher, DispatcherConfig, FailureLedger, GatewayConfig,
    Recipient, SendManyRequest, SmsConfig, SEND_MANY_PATH,
};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn live_dispatcher(server: &MockServer, max_batch_size: usize) -> Dispatcher {
    let config = SmsConfig {
        dispatcher: DispatcherConfig::default()
            .with_dry_run(false)
            .with_max_batch_size(max_batch_size)
            .with_batch_delay(Duration::from_millis(5)),
        gateway: GatewayConfig::new("NCSTEST", "top-secret", "0212345678")
            .with_base_url(server.uri())
            .with_timeout(Duration::from_millis(300)),
    };
    Dispatcher::new(&config, Arc::new(FailureLedger::new())).unwrap()
}

#[tokio::test]
async fn sends_signed_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_MANY_PATH))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "groupInfo": {
                "_id": "G4V20250101",
                "status": "SENDING",
                "count": { "total": 2, "registeredSuccess": 2, "registeredFailed": 0 }
            }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let dispatcher = live_dispatcher(&server, 2);
    let summary = dispatcher
        .send(
            vec![
                Recipient::new("A", "010-1111-2222"),
                Recipient::new("B", "010-3333-4444"),
                Recipient::new("C", "010-5555-6666"),
            ],
            "Retreat fee is due",
            "Notice",
        )
        .await
        .unwrap();

    assert_eq!(summary.total_targets, 3);
    assert_eq!(summary.success_count, 3);
    assert!(!summary.dry_run);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let mut salts = Vec::new();
    for request in &requests {
        let auth = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap();
        let parsed = verify_auth_header(auth, b"top-secret", 60, chrono::Utc::now()).unwrap();
        assert_eq!(parsed.api_key, "NCSTEST");
        salts.push(parsed.salt);
    }
    assert_ne!(salts[0], salts[1]);

    let first: SendManyRequest = requests[0].body_json().unwrap();
    assert_eq!(first.messages.len(), 2);
    assert_eq!(first.messages[0].to, "01011112222");
    assert_eq!(first.messages[0].from, "0212345678");
    assert_eq!(first.messages[0].subject, "Notice");
    assert_eq!(first.messages[0].text, "Retreat fee is due");

    let second: SendManyRequest = requests[1].body_json().unwrap();
    assert_eq!(second.messages.len(), 1);
    assert_eq!(second.messages[0].to, "01055556666");
}

#[tokio::test]
async fn server_error_fails_batch_and_fills_ledger() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_MANY_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let dispatcher = live_dispatcher(&server, 10);
    let summary = dispatcher
        .send(
            vec![Recipient::new("A", "01011112222"), Recipient::new("B", "01033334444")],
            "hello",
            "",
        )
        .await
        .unwrap();

    assert_eq!(summary.fail_count, 2);
    assert_eq!(summary.success_count, 0);
    for outcome in &summary.outcomes {
        assert_eq!(outcome.status, DispatchStatus::Fail);
        assert_eq!(outcome.detail.as_deref(), Some("gateway returned 500: internal"));
    }
    assert_eq!(dispatcher.list_failed().await.len(), 2);
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_MANY_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let dispatcher = live_dispatcher(&server, 10);
    let summary = dispatcher
        .send(vec![Recipient::new("A", "01011112222")], "hello", "")
        .await
        .unwrap();

    assert_eq!(summary.fail_count, 1);
    assert_eq!(
        summary.outcomes[0].detail.as_deref(),
        Some("gateway request timed out")
    );
}

#[tokio::test]
async fn retry_after_recovery_clears_ledger() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_MANY_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_MANY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let dispatcher = live_dispatcher(&server, 10);
    let first = dispatcher
        .send(vec![Recipient::new("A", "01011112222")], "hello", "")
        .await
        .unwrap();
    assert_eq!(first.fail_count, 1);

    let retried = dispatcher.retry("hello", "").await.unwrap();
    assert_eq!(retried.success_count, 1);
    assert!(dispatcher.list_failed().await.is_empty());
}

#[tokio::test]
async fn accepted_batch_with_full_group_body_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_MANY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "groupInfo": {
                "_id": "G4V20250101",
                "groupId": "G4V20250101",
                "status": "SENDING",
                "dateCreated": "2025-01-01T00:00:00.000Z",
                "count": {
                    "total": 2,
                    "sentTotal": 0,
                    "sentReplacement": 0,
                    "registeredSuccess": 2,
                    "registeredFailed": 0
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = live_dispatcher(&server, 10);
    let summary = dispatcher
        .send(
            vec![Recipient::new("A", "01011112222"), Recipient::new("B", "01033334444")],
            "hello",
            "",
        )
        .await
        .unwrap();

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.fail_count, 0);
    assert!(dispatcher.list_failed().await.is_empty());
}

#[tokio::test]
async fn accepted_batch_with_plain_text_body_is_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_MANY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = live_dispatcher(&server, 10);
    let summary = dispatcher
        .send(vec![Recipient::new("A", "01011112222")], "hello", "")
        .await
        .unwrap();

    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.outcomes[0].status, DispatchStatus::Success);
    assert_eq!(dispatcher.ledger().count().await, 0);
}
