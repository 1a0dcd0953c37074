//! Crate-wide error taxonomy (§7).
//!
//! Every lower-level error enum (`ObjectStoreError`, `ArchiveError`,
//! `NormalizeError`) converts into [`AppError`] via `From`, so call sites can
//! use `?` and let the taxonomy fall out of the conversion instead of
//! re-matching at every layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::archive::ArchiveError;
use crate::day_index::DayIndexError;
use crate::object_store::ObjectStoreError;
use crate::waveform::NormalizeError;

/// Errors that can occur while handling a stream request end to end.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad request; no stream has been opened yet, so this maps straight to a 4xx response.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A chunk-level operation failed permanently but the stream can continue.
    #[error("permanent error: {0}")]
    Permanent(String),

    /// Retryable error that was retried to exhaustion.
    #[error("transient error exhausted retries: {0}")]
    Transient(String),

    /// The normalizer produced zero samples after trimming and the whole
    /// request (not just one chunk) has nothing to return.
    #[error("no usable data for requested range")]
    NoUsableData,
}

impl From<ObjectStoreError> for AppError {
    fn from(e: ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::NotFound(_) => AppError::Permanent(e.to_string()),
            ObjectStoreError::Transient(_) => AppError::Transient(e.to_string()),
            ObjectStoreError::Permanent(_) => AppError::Permanent(e.to_string()),
        }
    }
}

impl From<ArchiveError> for AppError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::NoData => AppError::Permanent("archive has no data".into()),
            ArchiveError::Throttled | ArchiveError::Transient(_) => {
                AppError::Transient(e.to_string())
            }
            ArchiveError::Oversized => AppError::Permanent(
                "archive request oversized and could not be bisected further".into(),
            ),
            ArchiveError::Permanent(_) => AppError::Permanent(e.to_string()),
        }
    }
}

impl From<NormalizeError> for AppError {
    fn from(e: NormalizeError) -> Self {
        match e {
            NormalizeError::NoUsableData => AppError::NoUsableData,
            NormalizeError::Malformed(_) => AppError::Permanent(e.to_string()),
        }
    }
}

impl From<DayIndexError> for AppError {
    fn from(e: DayIndexError) -> Self {
        match e {
            DayIndexError::Store(inner) => inner.into(),
            DayIndexError::Conflict(_) => AppError::Transient("day index write conflict".into()),
        }
    }
}

/// JSON body returned for validation errors, the only variant visible
/// before a stream has opened (§6).
#[derive(Debug, Serialize)]
struct ValidationBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, axum::Json(ValidationBody { error: msg })).into_response()
            }
            other => {
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
            }
        }
    }
}
