use crate::domain::error::{ClaimError, ClaimRejection, PipelineError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

// Обертка над доменной ошибкой, чтобы реализовать для нее IntoResponse
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

fn error_body(status: StatusCode, error_code: &str, message: String) -> Response {
    let body = serde_json::json!({
        "error": message,
        "error_code": error_code,
    });
    (status, Json(body)).into_response()
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal error".to_string(),
    )
}

// Failures never carry `success`; the provider retries on any non-2xx.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            PipelineError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            PipelineError::MissingHeaders(msg) => {
                (StatusCode::BAD_REQUEST, "missing_headers", msg.clone())
            }
            PipelineError::WebhookSignature(_) => (
                StatusCode::UNAUTHORIZED,
                "webhook_signature",
                "invalid webhook signature".to_string(),
            ),
            PipelineError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            PipelineError::Provider(msg) => {
                tracing::error!("provider error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "provider_error",
                    "upstream provider unavailable".to_string(),
                )
            }
            PipelineError::Database(err) => {
                tracing::error!("database error: {err}");
                internal()
            }
            PipelineError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                internal()
            }
            PipelineError::Store(msg) => {
                tracing::error!("store error: {msg}");
                internal()
            }
        };

        error_body(status, error_code, message)
    }
}

/// Claim failures: each rejection keeps its own status and reason code so the
/// wallet UI can show the matching remediation.
pub struct ClaimApiError(pub ClaimError);

impl From<ClaimError> for ClaimApiError {
    fn from(err: ClaimError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ClaimApiError {
    fn into_response(self) -> Response {
        let rejection = match self.0 {
            ClaimError::Rejected(r) => r,
            ClaimError::Pipeline(e) => return ApiError(e).into_response(),
        };
        let status = match rejection {
            ClaimRejection::OrderNotFound => StatusCode::NOT_FOUND,
            ClaimRejection::NotPurchaser => StatusCode::FORBIDDEN,
            ClaimRejection::NotFulfilled
            | ClaimRejection::AlreadyClaimed
            | ClaimRejection::InvalidWallet(_) => StatusCode::BAD_REQUEST,
        };
        tracing::info!(reason = rejection.reason(), "claim rejected");
        error_body(status, rejection.reason(), rejection.to_string())
    }
}
