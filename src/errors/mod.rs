//! Error handling module for the team directory backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    extract::multipart::MultipartRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::FieldErrors;
use crate::upload::UploadError;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_FILE: &str = "INVALID_FILE";
    pub const TOO_LARGE: &str = "TOO_LARGE";
    pub const UNSUPPORTED_TYPE: &str = "UNSUPPORTED_TYPE";
    pub const STORAGE_WRITE_FAILED: &str = "STORAGE_WRITE_FAILED";
    pub const UPLOAD_INTERNAL_ERROR: &str = "UPLOAD_INTERNAL_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Authentication required
    Unauthorized(String),
    /// Resource not found
    NotFound(String),
    /// Field-level validation failure
    Validation(FieldErrors),
    /// Profile image rejected or not stored
    Upload(UploadError),
    /// Database error
    Database(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upload(err) => match err {
                UploadError::InvalidFile { .. }
                | UploadError::TooLarge { .. }
                | UploadError::UnsupportedType { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                UploadError::StorageWriteFailed | UploadError::InternalError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Upload(err) => match err {
                UploadError::InvalidFile { .. } => codes::INVALID_FILE,
                UploadError::TooLarge { .. } => codes::TOO_LARGE,
                UploadError::UnsupportedType { .. } => codes::UNSUPPORTED_TYPE,
                UploadError::StorageWriteFailed => codes::STORAGE_WRITE_FAILED,
                UploadError::InternalError(_) => codes::UPLOAD_INTERNAL_ERROR,
            },
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(errors) => errors
                .first_message()
                .unwrap_or("The given data was invalid.")
                .to_string(),
            AppError::Upload(err) => err.to_string(),
            AppError::Database(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
        }
    }

    /// Field-level messages, with upload failures attributed to `profile_image`.
    pub fn field_errors(&self) -> Option<FieldErrors> {
        match self {
            AppError::Validation(errors) => Some(errors.clone()),
            AppError::Upload(err) => Some(FieldErrors::single("profile_image", err.to_string())),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        AppError::Upload(err)
    }
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let errors = match error {
            AppError::Validation(fields) => serde_json::to_value(fields).ok(),
            _ => None,
        };

        Self {
            success: false,
            code: error.error_code().to_string(),
            message: error.message(),
            errors,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self.message());
        }
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
