//! Domain layer: entities, state machine and event schemas.

pub mod events;
pub mod transaction;

pub use events::{
    LifecycleEvent, TransactionCreated, TransactionStatusUpdated, TOPIC_TRANSACTION_CREATED,
    TOPIC_TRANSACTION_STATUS_UPDATED,
};
pub use transaction::{
    NewTransaction, Transaction, TransactionStats, TransactionStatus, TransactionType, Transition,
    TransitionError, DEFAULT_CURRENCY,
};
