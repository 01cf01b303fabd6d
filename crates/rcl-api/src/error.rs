use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::llm::LlmError;

/// PostgreSQL error code for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Language model error: {0}")]
    Llm(#[from] LlmError),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(_) | Self::Jwt(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            Self::Database(e) if is_unique_violation(e) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Llm(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message returned to the client. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Self::Auth(msg)
            | Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Conflict(msg)
            | Self::ServiceUnavailable(msg) => msg.clone(),
            Self::Database(sqlx::Error::RowNotFound) => "Resource not found".to_string(),
            Self::Database(e) if is_unique_violation(e) => "Resource already exists".to_string(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Llm(_) => "Language model request failed".to_string(),
            Self::Jwt(_) => "Invalid or expired token".to_string(),
        }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_client_errors_keep_message() {
        let (status, body) = body_json(ApiError::Validation("Name is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Name is required");

        let (status, body) = body_json(ApiError::Conflict("Quiz already graded".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Quiz already graded");
    }

    #[tokio::test]
    async fn test_internal_errors_are_hidden() {
        let (status, body) = body_json(ApiError::Internal("secret detail".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");

        let (status, body) = body_json(ApiError::Database(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_row_not_found_maps_to_404() {
        let (status, _) = body_json(ApiError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_llm_errors_map_to_bad_gateway() {
        let (status, body) =
            body_json(ApiError::Llm(LlmError::InvalidResponse("not json".into()))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Language model request failed");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Auth("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::ServiceUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
