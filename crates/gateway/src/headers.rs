// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP header helpers: dates, conditional requests, byte ranges

use chrono::{DateTime, Utc};
use std::time::SystemTime;

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[must_use]
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(HTTP_DATE).to_string()
}

#[must_use]
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// True when a conditional GET with this `If-Modified-Since` can be
/// answered with 304. Comparison is at whole-second resolution.
#[must_use]
pub fn not_modified_since(modified: SystemTime, if_modified_since: Option<&str>) -> bool {
    let Some(since) = if_modified_since.and_then(parse_http_date) else {
        return false;
    };
    DateTime::<Utc>::from(modified).timestamp() <= since.timestamp()
}

/// The outcome of interpreting a `Range` header against an object size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// Serve the whole object
    Full,
    /// Serve bytes `start..=end`
    Partial { start: u64, end: u64 },
    /// No byte of the object falls inside the requested range
    Unsatisfiable,
}

impl ByteRange {
    /// Interpret a `Range` header value
    ///
    /// Only a single `bytes=` range is honored. Multiple ranges, other
    /// units and malformed values fall back to `Full`.
    #[must_use]
    pub fn parse(header: Option<&str>, size: u64) -> Self {
        let Some(spec) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
            return ByteRange::Full;
        };
        if spec.contains(',') {
            return ByteRange::Full;
        }
        let Some((first, last)) = spec.trim().split_once('-') else {
            return ByteRange::Full;
        };

        match (first.trim(), last.trim()) {
            ("", "") => ByteRange::Full,
            ("", suffix) => match suffix.parse::<u64>() {
                Ok(0) => ByteRange::Unsatisfiable,
                Ok(_) if size == 0 => ByteRange::Unsatisfiable,
                Ok(n) => ByteRange::Partial {
                    start: size - n.min(size),
                    end: size - 1,
                },
                Err(_) => ByteRange::Full,
            },
            (start, end) => {
                let Ok(start) = start.parse::<u64>() else {
                    return ByteRange::Full;
                };
                let end = if end.is_empty() {
                    None
                } else {
                    match end.parse::<u64>() {
                        Ok(e) if e >= start => Some(e),
                        _ => return ByteRange::Full,
                    }
                };
                if start >= size {
                    return ByteRange::Unsatisfiable;
                }
                let last = size - 1;
                ByteRange::Partial {
                    start,
                    end: end.map_or(last, |e| e.min(last)),
                }
            }
        }
    }
}
