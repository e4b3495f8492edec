mod common;

use common::*;
use payment_adapter::models::payment::{ProcessorCall, REQUEST_TIMEOUT_REASON};
use payment_adapter::services::ledger::InMemoryLedger;
use payment_adapter::services::payment_processor_client::{Transport, TransportError};
use payment_adapter::services::{PaymentAdapter, PaymentProcessorClient};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn call(timeout: Duration) -> ProcessorCall {
    ProcessorCall {
        service_name: "onlineStore".to_string(),
        account_name: "acc-5".to_string(),
        transaction_id: Uuid::new_v4(),
        payment_id: Uuid::new_v4(),
        amount: 250,
        timeout,
    }
}

fn client(server: &MockServer) -> PaymentProcessorClient {
    PaymentProcessorClient::new(&server.uri(), Duration::from_secs(1), 4).unwrap()
}

#[tokio::test]
async fn test_posts_query_parameters_to_process_endpoint() {
    let server = MockServer::start().await;
    let call = call(Duration::from_secs(20));

    Mock::given(method("POST"))
        .and(path("/external/process"))
        .and(query_param("serviceName", "onlineStore"))
        .and(query_param("accountName", "acc-5"))
        .and(query_param("transactionId", call.transaction_id.to_string()))
        .and(query_param("paymentId", call.payment_id.to_string()))
        .and(query_param("amount", "250"))
        .and(query_param("timeout", "PT20S"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactionId": call.transaction_id,
            "paymentId": call.payment_id,
            "result": true,
            "message": null,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server).send(&call).await.unwrap();

    assert_eq!(reply.status, 200);
    let body: serde_json::Value = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(body["result"], true);
}

#[tokio::test]
async fn test_error_status_still_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let reply = client(&server).send(&call(Duration::from_secs(1))).await.unwrap();

    assert_eq!(reply.status, 500);
    assert_eq!(reply.body, b"boom");
}

#[tokio::test]
async fn test_slow_processor_is_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let err = client(&server)
        .send(&call(Duration::from_millis(50)))
        .await
        .unwrap_err();

    assert_eq!(err, TransportError::Timeout);
}

#[tokio::test]
async fn test_unreachable_processor_is_other_error() {
    let client = PaymentProcessorClient::new("http://127.0.0.1:1", Duration::from_secs(1), 1).unwrap();

    let err = client.send(&call(Duration::from_secs(1))).await.unwrap_err();

    assert!(matches!(err, TransportError::Other(_)));
}

#[tokio::test]
async fn test_adapter_retries_declined_payment_against_processor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/external/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": false,
            "message": "insufficient funds",
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/external/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": true,
            "message": null,
        })))
        .mount(&server)
        .await;

    let ledger = Arc::new(InMemoryLedger::new());
    let adapter = PaymentAdapter::new(
        account("acc-5"),
        Duration::from_secs(1),
        Arc::new(CountingGate::open()),
        Arc::new(client(&server)),
        ledger.clone(),
    );
    let request = request_with_deadline_in(10_000);

    let resolution = adapter.process(request).await;

    assert_eq!(resolution.attempts(), 2);
    let events = ledger.events(request.payment_id);
    assert_paired(&events);
    let resolved = resolutions(&events);
    assert_eq!(resolved[0].2.as_deref(), Some("insufficient funds"));
    assert!(resolved[1].1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_adapter_records_processor_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": true}))
                .set_delay(Duration::from_millis(300)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .mount(&server)
        .await;

    let ledger = Arc::new(InMemoryLedger::new());
    let adapter = PaymentAdapter::new(
        account("acc-5"),
        Duration::from_millis(50),
        Arc::new(CountingGate::open()),
        Arc::new(client(&server)),
        ledger.clone(),
    );
    let request = request_with_deadline_in(10_000);

    adapter.process(request).await;

    let resolved = resolutions(&ledger.events(request.payment_id));
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].2.as_deref(), Some(REQUEST_TIMEOUT_REASON));
    assert!(resolved[1].1);
}
