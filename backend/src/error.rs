use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::MessageResponse;

use crate::auth::jwt::JwtError;
use crate::auth::password::PasswordError;
use crate::db::RepositoryError;
use crate::history::HistoryError;
use crate::routes::predict::ValidationError;
use crate::storage::StorageError;

const INTERNAL_MESSAGE: &str = "Terjadi kesalahan pada server.";

/// Every handler failure. Rendered as `{"sukses": false, "pesan": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Classification(String),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Token error: {0}")]
    Token(#[from] JwtError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::MalformedHash => ApiError::Internal(e.to_string()),
            rule => ApiError::BadRequest(rule.to_string()),
        }
    }
}

impl From<HistoryError> for ApiError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::NotFound => ApiError::NotFound("Riwayat tidak ditemukan.".to_string()),
            HistoryError::Repository(e) => ApiError::Repository(e),
            HistoryError::Storage(e) => ApiError::Storage(e),
        }
    }
}

impl From<actix_web::error::BlockingError> for ApiError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        ApiError::Internal(format!("blocking task failed: {}", e))
    }
}

impl ApiError {
    /// Text shown to the client. Server-side faults get a generic message.
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Repository(RepositoryError::NotFound) => "Data tidak ditemukan.".to_string(),
            ApiError::Repository(_)
            | ApiError::Storage(_)
            | ApiError::Token(_)
            | ApiError::Internal(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) | ApiError::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Classification(_)
            | ApiError::Repository(_)
            | ApiError::Storage(_)
            | ApiError::Token(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        }
        HttpResponse::build(status).json(MessageResponse::failure(self.client_message()))
    }
}
