use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::validation::validate_user_id;

/// Set by the upstream auth layer once it has authenticated the caller.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, taken from the `X-User-Id` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing X-User-Id header".to_string()))?;

        validate_user_id("X-User-Id", user_id)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;

        Ok(CallerId(user_id.to_string()))
    }
}
