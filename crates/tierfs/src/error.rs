// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for tiered storage operations

use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification used by the HTTP layer to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InvalidRequest,
    NotFound,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid request path: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid glob pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote push of {key} failed: {message}")]
    RemotePushFailed { key: String, message: String },

    #[error("Remote tier unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Object store error: {0}")]
    Remote(#[from] object_store::Error),
}

impl Error {
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Error::InvalidRequest(msg.into())
    }

    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Error::NotFound(what.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    pub fn pattern<P: Into<String>, M: ToString>(pattern: P, message: M) -> Self {
        Error::Pattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }

    pub fn push_failed<K: Into<String>, M: ToString>(key: K, message: M) -> Self {
        Error::RemotePushFailed {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Wrap a local I/O error, keeping "missing" distinct from other failures
    pub fn io<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.as_ref().display().to_string())
        } else {
            Error::Io {
                path: path.as_ref().to_path_buf(),
                source,
            }
        }
    }

    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidRequest(_) => ErrorClass::InvalidRequest,
            Error::NotFound(_) => ErrorClass::NotFound,
            Error::Remote(object_store::Error::NotFound { .. }) => ErrorClass::NotFound,
            Error::Pattern { .. }
            | Error::Internal(_)
            | Error::Io { .. }
            | Error::RemotePushFailed { .. }
            | Error::RemoteUnavailable(_)
            | Error::Remote(_) => ErrorClass::Internal,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_is_classified_as_missing() {
        let err = Error::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());

        let err = Error::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no"),
        );
        assert_eq!(err.class(), ErrorClass::Internal);
    }

    #[test]
    fn test_pattern_errors_are_internal() {
        let err = Error::pattern("a/**b", "bad tree");
        assert_eq!(err.class(), ErrorClass::Internal);
        assert!(err.to_string().contains("a/**b"));
    }
}
