#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use payflow_txn::adapters::InMemoryTransactionRepository;
use payflow_txn::domain::{TOPIC_TRANSACTION_CREATED, TOPIC_TRANSACTION_STATUS_UPDATED};
use payflow_txn::events::{BroadcastEventPublisher, FanoutPublisher};
use payflow_txn::gateway::{GatewayError, GatewayStatusReport, PaymentHandle, PaymentRequest};
use payflow_txn::health::HealthService;
use payflow_txn::ports::{EventPublisher, PaymentGateway, PublishError};
use payflow_txn::services::{CreateTransactionRequest, TransactionLifecycle};
use payflow_txn::{create_app, AppState};

pub const CALLBACK_URL: &str = "http://localhost:8080/webhook/upi-callback";

/// Records every published event; optionally fails every publish.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(String, Value)>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, topic: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .count()
    }

    pub fn created_count(&self) -> usize {
        self.count(TOPIC_TRANSACTION_CREATED)
    }

    pub fn status_count(&self) -> usize {
        self.count(TOPIC_TRANSACTION_STATUS_UPDATED)
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &Value) -> Result<(), PublishError> {
        if self.fail {
            return Err(PublishError::Transport("broker unreachable".to_string()));
        }
        self.events
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.clone()));
        Ok(())
    }
}

/// Scripted gateway. Initiation succeeds with `GW-<n>` ids unless a failure is set.
#[derive(Default)]
pub struct FakeGateway {
    initiate_error: Mutex<Option<GatewayError>>,
    verify_report: Mutex<Option<GatewayStatusReport>>,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl FakeGateway {
    pub fn failing(error: GatewayError) -> Self {
        let gateway = Self::default();
        *gateway.initiate_error.lock().unwrap() = Some(error);
        gateway
    }

    pub fn set_verify_report(&self, report: GatewayStatusReport) {
        *self.verify_report.lock().unwrap() = Some(report);
    }

    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initiate(&self, request: &PaymentRequest) -> Result<PaymentHandle, GatewayError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());

        if let Some(error) = self.initiate_error.lock().unwrap().clone() {
            return Err(error);
        }

        Ok(PaymentHandle {
            payment_url: format!("upi://pay?tr={}", request.order_id),
            qr_code: "data:image/png;base64,QR".to_string(),
            gateway_transaction_id: format!("GW-{}", requests.len()),
        })
    }

    async fn verify(&self, _gateway_transaction_id: &str) -> Result<GatewayStatusReport, GatewayError> {
        self.verify_report
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GatewayError::Unavailable("no report scripted".to_string()))
    }
}

pub struct Harness {
    pub repository: Arc<InMemoryTransactionRepository>,
    pub publisher: Arc<RecordingPublisher>,
    pub gateway: Arc<FakeGateway>,
    pub lifecycle: TransactionLifecycle,
}

pub fn harness() -> Harness {
    harness_with(FakeGateway::default(), RecordingPublisher::default())
}

pub fn harness_with(gateway: FakeGateway, publisher: RecordingPublisher) -> Harness {
    let repository = Arc::new(InMemoryTransactionRepository::new());
    let publisher = Arc::new(publisher);
    let gateway = Arc::new(gateway);

    let lifecycle = TransactionLifecycle::new(
        repository.clone(),
        publisher.clone(),
        gateway.clone(),
        CALLBACK_URL.to_string(),
        "INR".to_string(),
    );

    Harness {
        repository,
        publisher,
        gateway,
        lifecycle,
    }
}

/// Router over the harness; the recording publisher and a broadcast feed both receive events.
pub fn app(h: &Harness, webhook_secret: Option<&str>) -> axum::Router {
    let feed = BroadcastEventPublisher::default();
    let lifecycle = TransactionLifecycle::new(
        h.repository.clone(),
        Arc::new(FanoutPublisher::new(vec![
            h.publisher.clone() as Arc<dyn EventPublisher>,
            Arc::new(feed.clone()) as Arc<dyn EventPublisher>,
        ])),
        h.gateway.clone(),
        CALLBACK_URL.to_string(),
        "INR".to_string(),
    );

    create_app(AppState {
        lifecycle,
        feed,
        health: HealthService::builder().build(),
        webhook_secret: webhook_secret.map(str::to_string),
    })
}

pub fn request(kind: &str, amount: &str) -> CreateTransactionRequest {
    CreateTransactionRequest {
        transaction_type: kind.to_string(),
        amount: amount.parse().unwrap(),
        description: None,
        vpa: None,
        to_user_id: None,
        bank_account: None,
        ifsc: None,
        metadata: None,
    }
}

pub fn upi_request(amount: &str) -> CreateTransactionRequest {
    CreateTransactionRequest {
        vpa: Some("merchant@okbank".to_string()),
        description: Some("Coffee".to_string()),
        ..request("UPI_PAYMENT", amount)
    }
}

pub fn p2p_request(amount: &str, to_user: &str) -> CreateTransactionRequest {
    CreateTransactionRequest {
        to_user_id: Some(to_user.to_string()),
        ..request("P2P_TRANSFER", amount)
    }
}

pub fn withdraw_request(amount: &str) -> CreateTransactionRequest {
    CreateTransactionRequest {
        bank_account: Some("123456789012".to_string()),
        ifsc: Some("HDFC0001234".to_string()),
        ..request("WITHDRAW", amount)
    }
}

pub fn report(order_id: &str, status: &str, message: &str) -> GatewayStatusReport {
    GatewayStatusReport {
        transaction_id: "GW-1".to_string(),
        order_id: order_id.to_string(),
        status: status.to_string(),
        amount: "100.00".to_string(),
        upi_ref: "UPI123456".to_string(),
        message: message.to_string(),
    }
}
