use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::Json;
use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::rag::rag::RagError;

/// Failures of `/api/chat` that happen before the first byte is streamed.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("upstream service failed: {0}")]
    Upstream(String),

    #[error("request deadline exceeded before streaming started")]
    Timeout,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Upstream(_) => "upstream_error",
            ApiError::Timeout => "timeout",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::InvalidRequest(msg) => ApiError::InvalidRequest(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("/api/chat failed: {}", self);
        }
        let body = ErrorBody { error: self.kind(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}
