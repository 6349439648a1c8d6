pub mod lifecycle;
pub mod reconciler;

pub use lifecycle::{
    CallbackOutcome, CreateTransactionRequest, InitiationOutcome, StatusChange,
    TransactionLifecycle, TransactionResponse, DEFAULT_GATEWAY_FAILURE,
};
pub use reconciler::{ReconcileSummary, Reconciler};
