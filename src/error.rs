//! Unified error type for the CAES service.
//!
//! Mirrors the shape of a storage-layer error enum (see the corpus's
//! `StorageError`), but carries HTTP semantics directly since every
//! variant here crosses the HTTP boundary via [`AppError::into_response`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by CAES components. Each variant maps to exactly one
/// HTTP status code; see §7 of the spec for the policy this encodes.
#[derive(Debug, Error)]
pub enum AppError {
    /// No authenticated principal.
    #[error("unauthorized")]
    Unauthorized,

    /// Missing row or cross-campaign access attempt. Deliberately generic —
    /// never distinguish "does not exist" from "not yours".
    #[error("not found")]
    NotFound,

    /// Malformed body, missing required field, invalid enum, unsupported
    /// source tuple.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Resolution on a non-pending item, or a second enrichment trigger
    /// while the job is already `enriching`.
    #[error("conflict: {0}")]
    Conflict(String),

    /// LLM or retrieval failure during background enrichment. Never
    /// reaches an HTTP response directly — it is recorded on the job.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    /// Unexpected failure; detail is logged, never echoed to the client.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("serialization error")]
    Serialization(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
struct ErrorEnvelope {
    code: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UpstreamFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) | AppError::Database(_) | AppError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to send to a client. Internal failures never leak
    /// their cause; everything else is already user-facing.
    fn public_message(&self) -> String {
        match self {
            AppError::Unauthorized => "authentication required".to_string(),
            AppError::NotFound => "not found".to_string(),
            AppError::InvalidRequest(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::UpstreamFailure(_) => "enrichment failed".to_string(),
            AppError::Internal(_) | AppError::Database(_) | AppError::Serialization(_) => {
                "internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed with internal error");
        } else {
            tracing::debug!(error = %self, "request failed");
        }
        let body = ErrorEnvelope {
            code: status.as_u16(),
            message: self.public_message(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}
