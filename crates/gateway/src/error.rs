// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use diagnostics::error;
use serde::Serialize;
use tierfs::ErrorClass;

/// Failures reported to HTTP clients
///
/// Messages are fixed strings: nothing from the local filesystem or the
/// remote tier leaks into a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Path is required")]
    PathRequired,

    #[error("Invalid path")]
    InvalidPath,

    #[error("Not found")]
    NotFound,

    #[error("No matching files found")]
    NoMatches,

    #[error("Internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            ApiError::PathRequired | ApiError::InvalidPath => StatusCode::BAD_REQUEST,
            ApiError::NotFound | ApiError::NoMatches => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a storage error from an exact-path request
    pub fn exact(err: &tierfs::Error) -> Self {
        match err.class() {
            ErrorClass::InvalidRequest => ApiError::InvalidPath,
            ErrorClass::NotFound => ApiError::NotFound,
            ErrorClass::Internal => Self::internal(err),
        }
    }

    /// Map a storage error from a wildcard request
    pub fn wildcard(err: &tierfs::Error) -> Self {
        match err.class() {
            ErrorClass::InvalidRequest => ApiError::InvalidPath,
            ErrorClass::NotFound => ApiError::NoMatches,
            ErrorClass::Internal => Self::internal(err),
        }
    }

    /// Log the underlying failure and hide it from the client
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        let reason = err.to_string();
        error!("Request failed: {#[emit::as_display] reason}");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
