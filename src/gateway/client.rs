use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use std::time::Duration;

use super::types::{
    GatewayError, GatewayStatusReport, InitiateResponse, PaymentHandle, PaymentRequest,
};
use crate::ports::PaymentGateway;

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

/// HTTP client for the external UPI payment gateway.
#[derive(Clone)]
pub struct UpiGatewayClient {
    client: Client,
    base_url: String,
    circuit_breaker: Breaker,
}

impl UpiGatewayClient {
    /// Creates a client with the default breaker: 3 consecutive failures, 60-120s back-off.
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self::with_circuit_breaker(base_url, timeout, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        UpiGatewayClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Runs `fut` behind the breaker. Only transport failures count against it;
    /// a business rejection means the gateway is up.
    async fn guarded<T, F>(&self, fut: F) -> Result<T, GatewayError>
    where
        F: std::future::Future<Output = Result<T, GatewayError>>,
    {
        let result = self
            .circuit_breaker
            .call_with(
                |e: &GatewayError| matches!(e, GatewayError::Unavailable(_)),
                fut,
            )
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen(
                "UPI gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl PaymentGateway for UpiGatewayClient {
    async fn initiate(&self, request: &PaymentRequest) -> Result<PaymentHandle, GatewayError> {
        let url = self.url("/upi/initiate");
        let client = self.client.clone();

        self.guarded(async move {
            let response = client.post(&url).json(request).send().await?;
            let status = response.status();
            let body = response.json::<InitiateResponse>().await.map_err(|e| {
                GatewayError::Unavailable(format!(
                    "undecodable initiate response (HTTP {}): {}",
                    status, e
                ))
            })?;

            if !body.success {
                return Err(GatewayError::Rejected(body.message));
            }

            Ok(PaymentHandle {
                payment_url: body.payment_url,
                qr_code: body.qr_code,
                gateway_transaction_id: body.transaction_id,
            })
        })
        .await
    }

    async fn verify(&self, gateway_transaction_id: &str) -> Result<GatewayStatusReport, GatewayError> {
        let url = self.url(&format!("/upi/verify/{}", gateway_transaction_id));
        let client = self.client.clone();

        self.guarded(async move {
            let response = client.get(&url).send().await?;
            let status = response.status();
            response.json::<GatewayStatusReport>().await.map_err(|e| {
                GatewayError::Unavailable(format!(
                    "undecodable verify response (HTTP {}): {}",
                    status, e
                ))
            })
        })
        .await
    }

    fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }
}
