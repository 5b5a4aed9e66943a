// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP front end for the tiered object store
//!
//! Every path under `/` names an object. GET and HEAD read it (or aggregate
//! a wildcard), POST stores the request body.

mod config;
mod error;
pub mod headers;

pub use config::{Config, LockMode};
pub use error::ApiError;

use crate::headers::{ByteRange, format_http_date, not_modified_since};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderName, IF_MODIFIED_SINCE,
    LAST_MODIFIED, RANGE,
};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use diagnostics::debug;
use futures::TryStreamExt;
use serde::Serialize;
use serde::de::IgnoredAny;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;
use tierfs::{LocalObject, TierCoordinator, WildcardOutcome, is_wildcard};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::{ReaderStream, StreamReader};
use tower_http::cors::{Any, CorsLayer};

/// Objects up to this size are checked for JSON content
pub const JSON_SNIFF_LIMIT: u64 = 1024 * 1024;

/// Number of objects behind a wildcard aggregate
pub const MATCHED_FILES: HeaderName = HeaderName::from_static("x-matched-files");

const OCTET_STREAM: &str = "application/octet-stream";
const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Clone)]
struct AppState {
    coordinator: Arc<TierCoordinator>,
}

#[derive(Debug, Serialize)]
struct WriteResponse {
    success: bool,
    path: String,
}

/// Build the application router over a coordinator
pub fn router(coordinator: Arc<TierCoordinator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD])
        .allow_headers(Any)
        .max_age(Duration::from_secs(5000));

    Router::new()
        .route("/", get(missing_path).head(missing_path).post(missing_path))
        .route("/{*path}", get(read).head(read).post(write))
        .layer(cors)
        .with_state(AppState { coordinator })
}

async fn missing_path() -> ApiError {
    ApiError::PathRequired
}

async fn read(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if path.trim_matches('/').is_empty() {
        return Err(ApiError::PathRequired);
    }
    let is_head = method == Method::HEAD;
    let verb = method.as_str();
    debug!("{verb} {#[emit::as_display] path}");

    if is_wildcard(&path) {
        return read_wildcard(&state, &path, is_head, &headers).await;
    }

    let object = state
        .coordinator
        .get(&path)
        .await
        .map_err(|e| ApiError::exact(&e))?;
    serve_object(object, &headers, is_head).await
}

async fn read_wildcard(
    state: &AppState,
    path: &str,
    is_head: bool,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let outcome = state
        .coordinator
        .wildcard(path, is_head)
        .await
        .map_err(|e| ApiError::wildcard(&e))?;

    match outcome {
        WildcardOutcome::Single(matched) => {
            let object = state
                .coordinator
                .open_local(&matched.meta.relative_path)
                .await
                .map_err(|e| ApiError::wildcard(&e))?;
            serve_object(object, headers, false).await
        }
        WildcardOutcome::Aggregate {
            total_size,
            last_modified,
            matched,
        } => Ok([
            (CONTENT_LENGTH, total_size.to_string()),
            (LAST_MODIFIED, format_http_date(last_modified)),
            (ACCEPT_RANGES, "bytes".to_string()),
            (CONTENT_TYPE, OCTET_STREAM.to_string()),
            (MATCHED_FILES, matched.to_string()),
        ]
        .into_response()),
        WildcardOutcome::Listing(paths) => Ok(Json(paths).into_response()),
    }
}

/// Answer a read of one object, honoring conditional and range requests
async fn serve_object(
    mut object: LocalObject,
    headers: &HeaderMap,
    is_head: bool,
) -> Result<Response, ApiError> {
    let modified = object.meta.modified;
    let last_modified = format_http_date(modified);

    let if_modified_since = headers.get(IF_MODIFIED_SINCE).and_then(|v| v.to_str().ok());
    if not_modified_since(modified, if_modified_since) {
        return Ok((StatusCode::NOT_MODIFIED, [(LAST_MODIFIED, last_modified)]).into_response());
    }

    let buffered = if object.meta.size <= JSON_SNIFF_LIMIT {
        let mut buf = Vec::new();
        _ = object
            .file
            .read_to_end(&mut buf)
            .await
            .map_err(ApiError::internal)?;
        Some(Bytes::from(buf))
    } else {
        None
    };
    let size = buffered
        .as_ref()
        .map_or(object.meta.size, |b| b.len() as u64);
    let content_type = match &buffered {
        Some(b) if serde_json::from_slice::<IgnoredAny>(b).is_ok() => APPLICATION_JSON,
        _ => OCTET_STREAM,
    };

    let range = if is_head {
        ByteRange::Full
    } else {
        ByteRange::parse(headers.get(RANGE).and_then(|v| v.to_str().ok()), size)
    };

    let mut response = Response::builder()
        .header(ACCEPT_RANGES, "bytes")
        .header(CONTENT_TYPE, content_type)
        .header(LAST_MODIFIED, last_modified.as_str());

    let (status, start, len) = match range {
        ByteRange::Full => (StatusCode::OK, 0, size),
        ByteRange::Partial { start, end } => {
            response = response.header(CONTENT_RANGE, format!("bytes {start}-{end}/{size}"));
            (StatusCode::PARTIAL_CONTENT, start, end - start + 1)
        }
        ByteRange::Unsatisfiable => {
            return Ok((
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(CONTENT_RANGE, format!("bytes */{size}"))],
            )
                .into_response());
        }
    };

    let body = match buffered {
        _ if is_head => Body::empty(),
        Some(bytes) => Body::from(bytes.slice(start as usize..(start + len) as usize)),
        None => {
            _ = object
                .file
                .seek(SeekFrom::Start(start))
                .await
                .map_err(ApiError::internal)?;
            Body::from_stream(ReaderStream::new(object.file.take(len)))
        }
    };

    response
        .status(status)
        .header(CONTENT_LENGTH, len)
        .body(body)
        .map_err(ApiError::internal)
}

async fn write(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Body,
) -> Result<Json<WriteResponse>, ApiError> {
    if path.trim_matches('/').is_empty() {
        return Err(ApiError::PathRequired);
    }
    // A stored `*` would be indistinguishable from a pattern on read
    if is_wildcard(&path) {
        return Err(ApiError::InvalidPath);
    }
    debug!("POST {#[emit::as_display] path}");

    let stream = body.into_data_stream().map_err(std::io::Error::other);
    let mut reader = std::pin::pin!(StreamReader::new(stream));

    let key = state
        .coordinator
        .put(&path, &mut reader)
        .await
        .map_err(|e| ApiError::exact(&e))?;

    Ok(Json(WriteResponse {
        success: true,
        path: key,
    }))
}
