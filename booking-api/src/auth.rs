use axum::http::HeaderMap;

use booking_core::error::WorkflowError;
use booking_core::repo::{SharedStore, UserRepo};
use booking_core::types::Actor;

use crate::error::ApiError;

/// Caller identity comes from the `X-User-Id` header; the gateway in front
/// of this service has already authenticated it. The role is always read
/// back from storage, never trusted from the request.
pub async fn actor(store: &SharedStore, headers: &HeaderMap) -> Result<Actor, ApiError> {
    let id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| {
            ApiError(WorkflowError::Forbidden(
                "missing or malformed X-User-Id header".to_string(),
            ))
        })?;

    let user = store
        .user(id)
        .await
        .map_err(WorkflowError::from)?
        .ok_or(WorkflowError::NotFound("user"))?;

    Ok(Actor {
        id: user.id,
        role: user.role,
    })
}
