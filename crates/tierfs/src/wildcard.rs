// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Wildcard expansion and aggregation over the local tier
//!
//! Objects that exist only in the remote tier are not visible here.

use crate::error::{Error, Result};
use crate::local::{LocalTier, ObjectMeta, STAGING_PREFIX};
use diagnostics::debug;
use std::path::PathBuf;
use std::time::SystemTime;
use wax::Glob;

/// A local object matched by a wildcard template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedObject {
    pub path: PathBuf,
    pub meta: ObjectMeta,
}

/// How a wildcard request should be answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WildcardOutcome {
    /// Exactly one match on a content request: serve it like an exact read
    Single(MatchedObject),
    /// Metadata request: combined size, newest mtime, match count
    Aggregate {
        total_size: u64,
        last_modified: SystemTime,
        matched: usize,
    },
    /// Several matches on a content request: their relative paths
    Listing(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct WildcardAggregator {
    local: LocalTier,
}

impl WildcardAggregator {
    #[must_use]
    pub fn new(local: LocalTier) -> Self {
        Self { local }
    }

    /// Expand and aggregate a wildcard logical path
    pub fn resolve(&self, logical_path: &str, is_head: bool) -> Result<WildcardOutcome> {
        let pattern = self.local.resolver().search_pattern(logical_path)?;
        debug!("Searching for pattern {#[emit::as_display] pattern}");

        let matches = self.expand(&pattern)?;
        let count = matches.len();
        debug!("Found {count} matching files");

        aggregate(matches, is_head)
    }

    /// Every regular file under the root matching `pattern`, sorted by path
    ///
    /// A bad pattern is `Pattern`; any failure to read a candidate is
    /// `Internal` and aborts the expansion.
    pub fn expand(&self, pattern: &str) -> Result<Vec<MatchedObject>> {
        let glob = Glob::new(pattern).map_err(|e| Error::pattern(pattern, e))?;
        let root = self.local.root();

        let mut matches = Vec::new();
        for entry in glob.walk(root) {
            let entry = entry.map_err(|e| Error::internal(format!("walking {pattern}: {e}")))?;
            let path = entry.path();

            let is_staging = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(STAGING_PREFIX));
            if is_staging {
                continue;
            }

            let md = std::fs::metadata(path).map_err(|e| {
                Error::internal(format!("metadata for match {}: {e}", path.display()))
            })?;
            if md.is_dir() {
                continue;
            }

            let meta = ObjectMeta {
                relative_path: self.local.resolver().relative_of(path)?,
                size: md.len(),
                modified: md.modified().map_err(|e| {
                    Error::internal(format!("mtime for match {}: {e}", path.display()))
                })?,
            };
            matches.push(MatchedObject {
                path: path.to_path_buf(),
                meta,
            });
        }

        matches.sort_by(|a, b| a.meta.relative_path.cmp(&b.meta.relative_path));
        Ok(matches)
    }
}

/// Combine matches according to the request kind
pub fn aggregate(matches: Vec<MatchedObject>, is_head: bool) -> Result<WildcardOutcome> {
    if matches.is_empty() {
        return Err(Error::not_found("no matching files"));
    }

    if is_head {
        let total_size = matches.iter().map(|m| m.meta.size).sum();
        let last_modified = matches
            .iter()
            .map(|m| m.meta.modified)
            .max()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        return Ok(WildcardOutcome::Aggregate {
            total_size,
            last_modified,
            matched: matches.len(),
        });
    }

    if matches.len() == 1 {
        let mut matches = matches;
        if let Some(single) = matches.pop() {
            return Ok(WildcardOutcome::Single(single));
        }
    }

    Ok(WildcardOutcome::Listing(
        matches.into_iter().map(|m| m.meta.relative_path).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn matched(rel: &str, size: u64, secs: u64) -> MatchedObject {
        MatchedObject {
            path: PathBuf::from("/root").join(rel),
            meta: ObjectMeta {
                relative_path: rel.to_string(),
                size,
                modified: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            },
        }
    }

    #[test]
    fn test_aggregate_empty_is_not_found() {
        assert!(aggregate(vec![], true).unwrap_err().is_not_found());
        assert!(aggregate(vec![], false).unwrap_err().is_not_found());
    }

    #[test]
    fn test_aggregate_head_sums() {
        let out = aggregate(vec![matched("a", 10, 5), matched("b", 20, 9)], true).unwrap();
        assert_eq!(
            out,
            WildcardOutcome::Aggregate {
                total_size: 30,
                last_modified: SystemTime::UNIX_EPOCH + Duration::from_secs(9),
                matched: 2,
            }
        );

        let out = aggregate(vec![matched("a", 10, 5)], true).unwrap();
        assert!(matches!(out, WildcardOutcome::Aggregate { matched: 1, .. }));
    }

    #[test]
    fn test_aggregate_get() {
        let out = aggregate(vec![matched("a", 10, 5)], false).unwrap();
        assert!(matches!(out, WildcardOutcome::Single(m) if m.meta.relative_path == "a"));

        let out = aggregate(vec![matched("a", 10, 5), matched("b", 20, 9)], false).unwrap();
        assert_eq!(
            out,
            WildcardOutcome::Listing(vec!["a".to_string(), "b".to_string()])
        );
    }

    async fn fixture() -> (TempDir, WildcardAggregator) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for (rel, size) in [
            ("month=01/year=2024/data.json", 10),
            ("month=02/year=2024/data.json", 20),
            ("month=02/year=2023/data.json", 7),
            ("month=03/year=2024/other.json", 3),
        ] {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, vec![b'x'; size]).unwrap();
        }
        // A directory that matches the leaf pattern must be ignored
        std::fs::create_dir_all(root.join("month=04/year=2024/data.json")).unwrap();
        // As must an in-progress staging file
        std::fs::write(
            root.join(format!("month=01/year=2024/{STAGING_PREFIX}abc")),
            b"partial",
        )
        .unwrap();

        let local = LocalTier::ensure_root(root).await.unwrap();
        (dir, WildcardAggregator::new(local))
    }

    #[tokio::test]
    async fn test_expand_partition_wildcard() {
        let (_dir, agg) = fixture().await;
        let out = agg.resolve("year=2024/month=*/data.json", true).unwrap();
        assert!(matches!(
            out,
            WildcardOutcome::Aggregate {
                total_size: 30,
                matched: 2,
                ..
            }
        ));

        let out = agg.resolve("/year=2024/month=*/data.json", false).unwrap();
        assert_eq!(
            out,
            WildcardOutcome::Listing(vec![
                "month=01/year=2024/data.json".to_string(),
                "month=02/year=2024/data.json".to_string(),
            ])
        );
    }

    #[tokio::test]
    async fn test_expand_leaf_wildcard_skips_staging() {
        let (_dir, agg) = fixture().await;
        let out = agg.resolve("year=2024/month=01/*", false).unwrap();
        assert!(matches!(out, WildcardOutcome::Single(m) if m.meta.size == 10));
    }

    #[tokio::test]
    async fn test_expand_no_match_is_not_found() {
        let (_dir, agg) = fixture().await;
        let err = agg.resolve("year=1999/month=*/data.json", true).unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_bad_pattern_is_pattern_error() {
        let (_dir, agg) = fixture().await;
        let err = agg.expand("month=*/a**b").unwrap_err();
        assert!(matches!(err, Error::Pattern { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_match_is_internal() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("m=01")).unwrap();
        std::fs::write(root.join("m=01/f.txt"), b"ok").unwrap();
        std::fs::create_dir_all(root.join("m=02")).unwrap();
        std::os::unix::fs::symlink(root.join("gone"), root.join("m=02/f.txt")).unwrap();

        let local = LocalTier::ensure_root(root).await.unwrap();
        let agg = WildcardAggregator::new(local);
        let err = agg.resolve("m=*/f.txt", true).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(err.class(), crate::error::ErrorClass::Internal);
    }
}
