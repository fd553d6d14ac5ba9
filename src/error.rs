// HTTP API Error Types
use axum::{extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::approval::TransitionError;
use crate::database::DatabaseError;
use crate::oplog::SyncError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict: illegal transitions and lost races
    Conflict(String),

    // 422 Unprocessable Entity: the request is well formed but resources are short
    InsufficientResource(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InsufficientResource(_) => 422,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InsufficientResource(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "success": false,
            "message": self.message(),
            "code": self.error_code()
        });

        if let ApiError::ValidationError {
            field_errors: Some(field_errors),
            ..
        } = self
        {
            response["field_errors"] = json!(field_errors);
        }

        response
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InsufficientResource(_) => "INSUFFICIENT_RESOURCE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn insufficient_resource(message: impl Into<String>) -> Self {
        ApiError::InsufficientResource(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation(constraint) => {
                tracing::warn!("Unique constraint rejected write: {}", constraint);
                ApiError::conflict("Record already exists")
            }
            e @ (DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl) => {
                tracing::error!("Database misconfigured: {}", e);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Migration(e) => {
                tracing::error!("Migration error: {}", e);
                ApiError::service_unavailable("Service is being updated, please try again later")
            }
            other => {
                // Log the real error but return generic message
                tracing::error!("Database error: {}", other);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Validation(msg) => ApiError::validation_error(msg, None),
            e @ TransitionError::NotFound(_) => ApiError::not_found(e.to_string()),
            e @ (TransitionError::SameStatus { .. } | TransitionError::Illegal { .. } | TransitionError::Conflict(_)) => {
                ApiError::conflict(e.to_string())
            }
            e @ (TransitionError::InsufficientStock { .. } | TransitionError::InsufficientPoints { .. }) => {
                ApiError::insufficient_resource(e.to_string())
            }
            TransitionError::Forbidden(msg) => ApiError::forbidden(msg),
            TransitionError::Database(e) => e.into(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Database(e) => e.into(),
            e @ (SyncError::BatchTooLarge { .. } | SyncError::InvalidOp(_)) => ApiError::validation_error(e.to_string(), None),
            e @ SyncError::UnknownJourney(_) => ApiError::not_found(e.to_string()),
            e @ SyncError::NotOwner(_) => ApiError::forbidden(e.to_string()),
            other => ApiError::conflict(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_errors_map_to_statuses() {
        let illegal: ApiError = TransitionError::Illegal {
            entity: "bag lift",
            from: "rejected".into(),
            to: "approved".into(),
        }
        .into();
        assert_eq!(illegal.status_code(), 409);

        let stock: ApiError = TransitionError::InsufficientStock {
            requested: 2,
            available: 1,
        }
        .into();
        assert_eq!(stock.status_code(), 422);
        assert_eq!(stock.to_json()["code"], "INSUFFICIENT_RESOURCE");

        let missing: ApiError = TransitionError::NotFound("Bag lift 1".into()).into();
        assert_eq!(missing.status_code(), 404);
    }

    #[test]
    fn envelope_carries_field_errors_only_when_present() {
        let mut fields = HashMap::new();
        fields.insert("bagCount".to_string(), "must be positive".to_string());
        let body = ApiError::validation_error("Invalid input", Some(fields)).to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["field_errors"]["bagCount"], "must be positive");

        let plain = ApiError::not_found("nope").to_json();
        assert!(plain.get("field_errors").is_none());
    }
}
