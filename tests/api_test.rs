mod common;

use axum::{
    body::{Body, HttpBody},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{harness, upi_request};
use payflow_txn::gateway::signature;

async fn body_json(response: Response) -> Value {
    let mut body = response.into_body();
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        bytes.extend_from_slice(&chunk.unwrap());
    }
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", user)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_circuit_state() {
    let h = harness();
    let app = common::app(&h, None);

    let (status, body) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["gateway_circuit"], "closed");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let h = harness();
    let app = common::app(&h, None);

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/transactions/p2p-transfer",
            None,
            json!({"amount": "10.00", "toUserId": "user-2"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn test_p2p_transfer_endpoint_returns_settled_transaction() {
    let h = harness();
    let app = common::app(&h, None);

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/transactions/p2p-transfer",
            Some("user-1"),
            json!({"amount": "50.00", "toUserId": "user-2", "description": "Dinner"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let tx = &body["transaction"];
    assert_eq!(tx["type"], "P2P_TRANSFER");
    assert_eq!(tx["status"], "SUCCESS");
    assert_eq!(tx["toUserId"], "user-2");
    assert!(tx["completedAt"].is_string());
    assert!(body.get("paymentUrl").is_none());
}

#[tokio::test]
async fn test_upi_payment_endpoint_returns_payment_handle() {
    let h = harness();
    let app = common::app(&h, None);

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/transactions/upi-payment",
            Some("user-1"),
            json!({"amount": "100.00", "vpa": "merchant@okbank"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["transaction"]["status"], "PENDING");
    assert_eq!(body["transaction"]["gatewayTransactionId"], "GW-1");
    assert!(body["paymentUrl"].as_str().unwrap().starts_with("upi://pay"));
    assert!(body["qrCode"].is_string());
}

#[tokio::test]
async fn test_generic_create_validates_input() {
    let h = harness();
    let app = common::app(&h, None);

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/transactions",
            Some("user-1"),
            json!({"type": "REFUND", "amount": "10.00"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/transactions",
            Some("user-1"),
            json!({"type": "WITHDRAW", "amount": "10.001", "bankAccount": "123456789012", "ifsc": "HDFC0001234"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("amount"));

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/transactions",
            Some("user-1"),
            json!({"type": "WITHDRAW", "amount": "10.00", "bankAccount": "123456789012", "ifsc": "HDFC0001234"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["transaction"]["status"], "PENDING");

    assert_eq!(h.repository.len().await, 1);
}

#[tokio::test]
async fn test_gateway_rejection_maps_to_unprocessable() {
    let h = common::harness_with(
        common::FakeGateway::failing(payflow_txn::gateway::GatewayError::Rejected(
            "VPA does not exist".to_string(),
        )),
        common::RecordingPublisher::default(),
    );
    let app = common::app(&h, None);

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/transactions/upi-payment",
            Some("user-1"),
            json!({"amount": "100.00", "vpa": "nobody@okbank"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("VPA does not exist"));

    let (_, list) = send(&app, get("/api/v1/transactions", "user-1")).await;
    assert_eq!(list["transactions"][0]["status"], "FAILED");
    assert_eq!(list["transactions"][0]["failureReason"], "VPA does not exist");
}

#[tokio::test]
async fn test_get_transaction_enforces_ownership() {
    let h = harness();
    let app = common::app(&h, None);
    let tx = h.lifecycle.create("user-1", upi_request("10.00")).await.unwrap();
    let uri = format!("/api/v1/transactions/{}", tx.id);

    let (status, body) = send(&app, get(&uri, "user-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], tx.id.to_string());

    let (status, _) = send(&app, get(&uri, "user-9")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, get("/api/v1/transactions/not-a-uuid", "user-1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = format!("/api/v1/transactions/{}", uuid::Uuid::new_v4());
    let (status, _) = send(&app, get(&unknown, "user-1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_endpoint() {
    let h = harness();
    let app = common::app(&h, None);
    let tx = h.lifecycle.create("user-1", upi_request("10.00")).await.unwrap();
    let uri = format!("/api/v1/transactions/{}/cancel", tx.id);

    let (status, _) = send(&app, post_json(&uri, Some("user-2"), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, post_json(&uri, Some("user-1"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["transaction"]["status"], "CANCELLED");

    let (status, _) = send(&app, post_json(&uri, Some("user-1"), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_list_and_stats() {
    let h = harness();
    let app = common::app(&h, None);
    for amount in ["1.00", "2.00", "3.00"] {
        h.lifecycle
            .submit("user-1", common::p2p_request(amount, "user-2"))
            .await
            .unwrap();
    }

    let (status, body) = send(&app, get("/api/v1/transactions?limit=2", "user-1")).await;
    assert_eq!(status, StatusCode::OK);
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["amount"], "3.00");

    let (_, body) = send(&app, get("/api/v1/transactions", "user-2")).await;
    assert_eq!(body["transactions"].as_array().unwrap().len(), 3);

    let (status, body) = send(&app, get("/api/v1/transactions/stats", "user-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "totalTransactions": 3,
            "successfulTransactions": 3,
            "failedTransactions": 0,
            "pendingTransactions": 0
        })
    );
}

#[tokio::test]
async fn test_webhook_success_and_redelivery() {
    let h = harness();
    let app = common::app(&h, None);
    let tx = h.lifecycle.create("user-1", upi_request("100.00")).await.unwrap();
    let callback = json!({
        "transactionId": "GW-1",
        "orderId": tx.id.to_string(),
        "status": "SUCCESS",
        "amount": "100.00",
        "upiRef": "UPI987",
        "message": "Paid"
    });

    for _ in 0..2 {
        let (status, body) = send(&app, post_json("/webhook/upi-callback", None, callback.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
    }

    let stored = h.lifecycle.get(tx.id).await.unwrap();
    assert_eq!(stored.status.as_str(), "SUCCESS");
    assert_eq!(stored.upi_reference.as_deref(), Some("UPI987"));
    assert_eq!(h.publisher.status_count(), 1);
}

#[tokio::test]
async fn test_webhook_unmapped_status_is_acknowledged() {
    let h = harness();
    let app = common::app(&h, None);
    let tx = h.lifecycle.create("user-1", upi_request("100.00")).await.unwrap();

    let (status, body) = send(
        &app,
        post_json(
            "/webhook/upi-callback",
            None,
            json!({"orderId": tx.id.to_string(), "status": "PENDING"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(h.lifecycle.get(tx.id).await.unwrap(), tx);
}

#[tokio::test]
async fn test_webhook_rejects_malformed_payloads() {
    let h = harness();
    let app = common::app(&h, None);

    let (status, _) = send(
        &app,
        post_json(
            "/webhook/upi-callback",
            None,
            json!({"orderId": "ORD-1", "status": "SUCCESS"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json("/webhook/upi-callback", None, json!({"status": "SUCCESS"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let raw = Request::builder()
        .method("POST")
        .uri("/webhook/upi-callback")
        .body(Body::from("not json"))
        .unwrap();
    let (status, _) = send(&app, raw).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(h.publisher.events().is_empty());
}

#[tokio::test]
async fn test_webhook_conflicting_outcome_is_conflict() {
    let h = harness();
    let app = common::app(&h, None);
    let tx = h.lifecycle.create("user-1", upi_request("100.00")).await.unwrap();
    h.lifecycle.cancel(tx.id, "user-1").await.unwrap();

    let (status, _) = send(
        &app,
        post_json(
            "/webhook/upi-callback",
            None,
            json!({"orderId": tx.id.to_string(), "status": "SUCCESS"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_webhook_signature_required_when_secret_set() {
    let h = harness();
    let app = common::app(&h, Some("hook-secret"));
    let tx = h.lifecycle.create("user-1", upi_request("100.00")).await.unwrap();
    let body = json!({"orderId": tx.id.to_string(), "status": "SUCCESS"}).to_string();

    let unsigned = Request::builder()
        .method("POST")
        .uri("/webhook/upi-callback")
        .body(Body::from(body.clone()))
        .unwrap();
    let (status, _) = send(&app, unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.lifecycle.get(tx.id).await.unwrap().status.as_str(), "PENDING");

    let signed = Request::builder()
        .method("POST")
        .uri("/webhook/upi-callback")
        .header(
            signature::SIGNATURE_HEADER,
            signature::sign("hook-secret", body.as_bytes()),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(&app, signed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.lifecycle.get(tx.id).await.unwrap().status.as_str(), "SUCCESS");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let h = harness();
    let app = common::app(&h, None);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
