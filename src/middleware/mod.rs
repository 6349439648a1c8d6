pub mod identity;
pub mod request_logger;

pub use identity::{CallerId, USER_ID_HEADER};
pub use request_logger::{request_logger_middleware, REQUEST_ID_HEADER};
