use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use sleepinn_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    Unavailable(Vec<NaiveDate>),
    ConflictError(String),
    UpstreamError(String),
    ServiceUnavailable(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unavailable(days) => {
                let missing: Vec<String> = days.iter().map(|d| d.to_string()).collect();
                let body = Json(json!({
                    "error": "unavailable",
                    "missingDays": missing,
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UpstreamError(msg) => {
                tracing::error!("Payment provider error: {}", msg);
                let body = Json(json!({
                    "error": "payment provider error",
                    "detail": msg,
                }));
                return (StatusCode::BAD_GATEWAY, body).into_response();
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Unexpected error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => AppError::ValidationError(msg),
            CoreError::NotFound(what) => AppError::NotFoundError(format!("{what} not found")),
            CoreError::Unavailable { missing_days } => AppError::Unavailable(missing_days),
            CoreError::Conflict => AppError::ConflictError("conflict".to_string()),
            CoreError::IllegalTransition(msg) => AppError::ConflictError(msg),
            CoreError::Forbidden => AppError::AuthorizationError("forbidden".to_string()),
            CoreError::UpstreamPayment(msg) => AppError::UpstreamError(msg),
            CoreError::PaymentsDisabled => {
                AppError::ServiceUnavailable("payments are not configured".to_string())
            }
            CoreError::TransientStore(msg) => {
                tracing::warn!("Giving up after transient store failures: {}", msg);
                AppError::ServiceUnavailable("temporarily unavailable, retry".to_string())
            }
            CoreError::Store(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Anyhow(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unavailable_lists_missing_days() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let (status, body) = body_of(CoreError::Unavailable { missing_days: vec![day] }.into()).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["missingDays"], json!(["2025-06-02"]));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (CoreError::Conflict, StatusCode::CONFLICT),
            (CoreError::IllegalTransition("trip already started".into()), StatusCode::CONFLICT),
            (CoreError::Forbidden, StatusCode::FORBIDDEN),
            (CoreError::NotFound("booking x".into()), StatusCode::NOT_FOUND),
            (CoreError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (CoreError::UpstreamPayment("declined".into()), StatusCode::BAD_GATEWAY),
            (CoreError::TransientStore("40001".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CoreError::Store("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let (status, _) = body_of(err.into()).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_provider_rejection_carries_detail() {
        let (status, body) =
            body_of(CoreError::UpstreamPayment("charge ch_1 has already been refunded".into()).into()).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "payment provider error");
        assert_eq!(body["detail"], "charge ch_1 has already been refunded");
    }

    #[tokio::test]
    async fn test_internal_details_are_not_leaked() {
        let (_, body) = body_of(CoreError::Store("password=hunter2".into()).into()).await;
        assert_eq!(body["error"], "Internal Server Error");
    }
}
