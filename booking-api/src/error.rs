use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use tracing::error;

use booking_core::error::WorkflowError;

/// Wire form of a workflow error. The `kind` is stable; clients branch on
/// it, not on the message.
pub struct ApiError(pub WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        ApiError(e)
    }
}

impl From<booking_core::StoreError> for ApiError {
    fn from(e: booking_core::StoreError) -> Self {
        ApiError(WorkflowError::Store(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            WorkflowError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::InvalidState(_) | WorkflowError::Conflict(_) => StatusCode::CONFLICT,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::Store(booking_core::StoreError::NotFound) => StatusCode::NOT_FOUND,
            WorkflowError::Store(e) => {
                error!(error = %e, "storage error in request handler");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({
            "error": {
                "kind": self.0.kind(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
