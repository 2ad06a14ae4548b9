use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::backend::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    SlugTaken,
    VersionConflict,
    Invalid,
    Internal,
}

/// JSON error payload shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    MetadataUnavailable(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorCode::Invalid),
            AppError::MetadataUnavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal)
            }
            AppError::Backend(err) => match err {
                BackendError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
                BackendError::SlugTaken(_) => (StatusCode::CONFLICT, ErrorCode::SlugTaken),
                BackendError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::VersionConflict),
                BackendError::Invalid(_) => (StatusCode::BAD_REQUEST, ErrorCode::Invalid),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: Some(code),
        };
        (status, Json(body)).into_response()
    }
}
