use crate::orchestration::OrchestrationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Body returned when the ledger cannot be read; details stay in the logs.
pub const LEDGER_UNAVAILABLE_MESSAGE: &str = "ledger unavailable, retry shortly";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),
}

impl From<OrchestrationError> for AppError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::GameNotFound(id) => AppError::NotFound(format!("game {}", id)),
            OrchestrationError::LedgerUnavailable(e) => AppError::LedgerUnavailable(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::LedgerUnavailable(detail) => {
                tracing::warn!(detail = %detail, "Ledger read failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    LEDGER_UNAVAILABLE_MESSAGE.to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GameId;
    use crate::ledger::LedgerError;

    #[test]
    fn test_orchestration_error_mapping() {
        let err: AppError = OrchestrationError::GameNotFound(GameId(3)).into();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "game 3"));

        let err: AppError =
            OrchestrationError::LedgerUnavailable(LedgerError::RateLimited).into();
        assert!(matches!(err, AppError::LedgerUnavailable(_)));
    }

    #[test]
    fn test_ledger_unavailable_is_terse_503() {
        let response =
            AppError::LedgerUnavailable("HTTP error 502: Server error".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
