//! Caller clearance from the `X-Access-Level` header. Authentication happens upstream.

use crate::error::ApiError;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const ACCESS_LEVEL_HEADER: &str = "X-Access-Level";

/// Missing header means level 0, which no registered model grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessLevel(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for AccessLevel
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(ACCESS_LEVEL_HEADER) else {
            return Ok(AccessLevel(0));
        };
        raw.to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(AccessLevel)
            .ok_or_else(|| ApiError::BadRequest(format!("{} must be an integer", ACCESS_LEVEL_HEADER)))
    }
}
