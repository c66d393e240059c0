use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use storage::StorageError;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Object not found: {0}")]
    NoSuchKey(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Content-Length header is required")]
    LengthRequired,

    #[error("Upload too large: {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        if let StorageError::InvalidName(name) = err.root_cause() {
            return ApiError::InvalidRequest(format!("invalid file name {:?}", name));
        }

        match err {
            StorageError::NotFound(name) => ApiError::NoSuchKey(name),
            StorageError::AlreadyExists(name) => ApiError::AlreadyExists(name),
            StorageError::EmptyInput => ApiError::InvalidRequest("empty file".to_string()),
            StorageError::Internal(msg) => ApiError::InternalError(msg),
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "StorageError"),
            ApiError::NoSuchKey(_) => (StatusCode::NOT_FOUND, "NoSuchKey"),
            ApiError::AlreadyExists(_) => (StatusCode::CONFLICT, "AlreadyExists"),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            ApiError::LengthRequired => (StatusCode::LENGTH_REQUIRED, "MissingContentLength"),
            ApiError::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "EntityTooLarge"),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        let request_id = uuid::Uuid::new_v4();
        if status.is_server_error() {
            tracing::error!("Request {} failed: {}", request_id, self);
        }

        let body = serde_json::json!({
            "code": error_code,
            "message": self.to_string(),
            "request_id": request_id.to_string(),
        });

        (status, Json(body)).into_response()
    }
}
