use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Response structure for API errors, serialized as `{"error": {...}}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Details of an API error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetails {
    /// A machine-readable error code string (e.g. "INVALID_BODY")
    pub code: String,
    /// A human-readable error message describing what went wrong
    pub message: String,
}

/// Errors the translation service reports to its clients.
#[derive(Debug, Error)]
pub enum TraductorServiceError {
    /// The request body is not JSON, or lacks a string `data` field
    #[error("Invalid request body: {message}")]
    InvalidBody {
        /// Description of why the request body is invalid
        message: String,
        /// The endpoint that the error occurred on
        endpoint: String,
    },

    /// The model failed while decoding the translation
    #[error("Model error: {model_error}")]
    ModelError {
        /// Description of the model error
        model_error: String,
        /// The endpoint that the error occurred on
        endpoint: String,
    },

    /// Unexpected failure, such as a panicked decoding task
    #[error("Internal server error: {message}")]
    InternalError {
        /// Description of the internal error
        message: String,
        /// The endpoint that the error occurred on
        endpoint: String,
    },
}

impl TraductorServiceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidBody { .. } => "INVALID_BODY",
            Self::ModelError { .. } => "MODEL_ERROR",
            Self::InternalError { .. } => "INTERNAL_ERROR",
        }
    }

    /// Message sent back to the client. Internal details are left out.
    fn client_message(&self) -> String {
        match self {
            Self::InvalidBody { message, .. } => format!("Invalid request body: {}", message),
            Self::ModelError { .. } => "Failed to translate the sentence".to_string(),
            Self::InternalError { .. } => "Internal server error occurred".to_string(),
        }
    }

    /// Maps the error onto its HTTP status code
    ///
    /// - `400 Bad Request` for invalid request bodies
    /// - `500 Internal Server Error` for model and internal failures
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody { .. } => StatusCode::BAD_REQUEST,
            Self::ModelError { .. } | Self::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn endpoint(&self) -> &str {
        match self {
            Self::InvalidBody { endpoint, .. }
            | Self::ModelError { endpoint, .. }
            | Self::InternalError { endpoint, .. } => endpoint,
        }
    }
}

impl IntoResponse for TraductorServiceError {
    fn into_response(self) -> Response {
        tracing::error!(
            target = "traductor-service",
            event = "error_occurred",
            endpoint = self.endpoint(),
            error = %self,
        );
        let error_response = ErrorResponse {
            error: ErrorDetails {
                code: self.error_code().to_string(),
                message: self.client_message(),
            },
        };
        (self.status_code(), Json(error_response)).into_response()
    }
}
