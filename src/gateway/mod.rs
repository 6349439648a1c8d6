pub mod client;
pub mod signature;
pub mod types;

pub use client::UpiGatewayClient;
pub use types::{
    GatewayError, GatewayStatusReport, PaymentHandle, PaymentRequest, GATEWAY_STATUS_FAILURE,
    GATEWAY_STATUS_SUCCESS,
};
