//! REST API module.
//!
//! Public JSON endpoints for team members plus the multipart form reader
//! shared with the admin surface.

mod form;
mod members;

pub use form::*;
pub use members::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    pub status: StatusCode,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Create a 201 response for a freshly created resource.
pub fn created<T: Serialize>(data: T, message: &str) -> ApiResult<T> {
    Ok(ApiResponse::new(data)
        .with_status(StatusCode::CREATED)
        .with_message(message))
}

/// Create a data-less success response carrying only a message.
pub fn acknowledged(message: &str) -> ApiResult<()> {
    Ok(ApiResponse {
        status: StatusCode::OK,
        success: true,
        message: Some(message.to_string()),
        data: None,
    })
}
