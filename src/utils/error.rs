use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;
use crate::utils::response::error as error_response;
use crate::validation::FieldViolation;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Edit not allowed: {0}")]
    EditNotAllowed(String),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Custom fields do not match the event schema ({} violation(s))", .0.len())]
    SchemaValidationFailed(Vec<FieldViolation>),

    #[error("Invalid custom fields schema: {0}")]
    SchemaError(String),

    #[error("No modification: {0}")]
    NoModification(String),

    #[error("Document store unavailable")]
    StoreUnavailable(#[source] StoreError),
}

impl AppError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::InvalidFieldValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::EditNotAllowed(_) => StatusCode::FORBIDDEN,
            AppError::InvalidFieldValue { .. } => StatusCode::BAD_REQUEST,
            AppError::SchemaValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SchemaError(_) => StatusCode::BAD_REQUEST,
            AppError::NoModification(_) => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyExists(_) => "ALREADY_EXISTS",
            AppError::EditNotAllowed(_) => "EDIT_NOT_ALLOWED",
            AppError::InvalidFieldValue { .. } => "INVALID_FIELD_VALUE",
            AppError::SchemaValidationFailed(_) => "SCHEMA_VALIDATION_FAILED",
            AppError::SchemaError(_) => "SCHEMA_ERROR",
            AppError::NoModification(_) => "NO_MODIFICATION",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    fn log(&self) {
        match self {
            AppError::StoreUnavailable(e) => {
                error!(error = ?e, "Document store error");
            }
            other => {
                warn!(code = other.code(), message = %other, "Request rejected");
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => AppError::AlreadyExists(what),
            other => AppError::StoreUnavailable(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::StoreUnavailable(_) => "A database error occurred".to_string(),
            other => other.to_string(),
        };

        let details = match &self {
            AppError::SchemaValidationFailed(violations) => serde_json::to_value(violations).ok(),
            _ => None,
        };

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_store_error_becomes_already_exists() {
        let err: AppError = StoreError::Duplicate("ticket".into()).into();
        assert_eq!(err.code(), "ALREADY_EXISTS");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_driver_error_becomes_store_unavailable() {
        let err: AppError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.code(), "STORE_UNAVAILABLE");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_codes_are_distinct_for_domain_errors() {
        let errors = [
            AppError::NotFound("x".into()),
            AppError::AlreadyExists("x".into()),
            AppError::EditNotAllowed("x".into()),
            AppError::invalid_field("x", "y"),
            AppError::SchemaValidationFailed(vec![]),
            AppError::SchemaError("x".into()),
            AppError::NoModification("x".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(AppError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[tokio::test]
    async fn test_schema_failure_renders_violations() {
        let err = AppError::SchemaValidationFailed(vec![FieldViolation {
            path: "/shirtSize".into(),
            message: "\"XL\" is not one of [\"S\",\"M\",\"L\"]".into(),
        }]);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "SCHEMA_VALIDATION_FAILED");
        assert_eq!(json["error"]["details"][0]["path"], "/shirtSize");
    }
}
