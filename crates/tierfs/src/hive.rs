// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Hive-style path resolution
//!
//! A logical path such as `year=2024/month=01/data.json` is decomposed into
//! partition pairs and a leaf name. The physical layout under the local root
//! always orders partitions by key, so any permutation of the same pairs
//! lands on the same file.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Character that turns a request into a wildcard query
pub const WILDCARD: char = '*';

/// Glob metacharacters that must be escaped when they appear literally
const GLOB_META: &[char] = &['?', '$', ':', '<', '>', '(', ')', '[', ']', '{', '}', ','];

/// Never accepted in a logical path; it cannot be expressed in a glob template
const ESCAPE: char = '\\';

/// Parsed view of a logical path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HivePathInfo {
    /// Partition key to value, iterated in canonical (lexicographic) order
    pub partitions: BTreeMap<String, String>,
    /// Last path segment
    pub file_name: String,
    /// Normalized form of the request path, used for non-hive paths
    pub raw: String,
}

impl HivePathInfo {
    #[must_use]
    pub fn is_hive_style(&self) -> bool {
        !self.partitions.is_empty()
    }

    /// `key=value` segments in canonical order
    pub fn partition_segments(&self) -> impl Iterator<Item = String> + '_ {
        self.partitions.iter().map(|(k, v)| format!("{k}={v}"))
    }

    /// Location relative to the tier root, `/`-separated
    #[must_use]
    pub fn relative_path(&self) -> String {
        if self.is_hive_style() {
            let mut segments: Vec<String> = self.partition_segments().collect();
            segments.push(self.file_name.clone());
            segments.join("/")
        } else {
            self.raw.clone()
        }
    }

    /// Glob template relative to the tier root
    ///
    /// Every `*` stays a wildcard, other glob metacharacters are escaped so
    /// literal values only match themselves.
    #[must_use]
    pub fn search_pattern(&self) -> String {
        if self.is_hive_style() {
            let mut segments: Vec<String> = self
                .partitions
                .iter()
                .map(|(k, v)| format!("{}={}", escape_glob(k), escape_glob(v)))
                .collect();
            segments.push(escape_glob(&self.file_name));
            segments.join("/")
        } else {
            self.raw
                .split('/')
                .map(escape_glob)
                .collect::<Vec<_>>()
                .join("/")
        }
    }
}

/// True when the logical path should be served by wildcard aggregation
#[must_use]
pub fn is_wildcard(logical_path: &str) -> bool {
    logical_path.contains(WILDCARD)
}

/// Parse a logical path into partitions and leaf
///
/// Segments before the leaf that are not `key=value` are dropped without
/// error. Empty segments are ignored. Empty paths, `.`/`..` segments and
/// backslashes are rejected.
pub fn parse_hive_path(logical_path: &str) -> Result<HivePathInfo> {
    let segments: Vec<&str> = logical_path.split('/').filter(|s| !s.is_empty()).collect();

    let Some((file_name, parents)) = segments.split_last() else {
        return Err(Error::invalid_request("path is empty"));
    };

    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(Error::invalid_request(format!(
            "relative segments are not allowed: {logical_path}"
        )));
    }

    if logical_path.contains(ESCAPE) {
        return Err(Error::invalid_request(format!(
            "backslash is not allowed: {logical_path}"
        )));
    }

    let mut partitions = BTreeMap::new();
    for segment in parents {
        if let Some((key, value)) = segment.split_once('=') {
            _ = partitions.insert(key.to_string(), value.to_string());
        }
    }

    Ok(HivePathInfo {
        partitions,
        file_name: (*file_name).to_string(),
        raw: segments.join("/"),
    })
}

fn escape_glob(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if GLOB_META.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Maps logical paths onto the local tier's directory layout
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of an exact logical path
    pub fn physical_location(&self, logical_path: &str) -> Result<PathBuf> {
        let info = parse_hive_path(logical_path)?;
        Ok(self.physical_of(&info))
    }

    /// Location relative to the root; also the remote object key
    pub fn relative_location(&self, logical_path: &str) -> Result<String> {
        Ok(parse_hive_path(logical_path)?.relative_path())
    }

    /// Glob template, relative to the root, for a wildcard logical path
    pub fn search_pattern(&self, logical_path: &str) -> Result<String> {
        Ok(parse_hive_path(logical_path)?.search_pattern())
    }

    #[must_use]
    pub fn physical_of(&self, info: &HivePathInfo) -> PathBuf {
        let mut path = self.root.clone();
        if info.is_hive_style() {
            for segment in info.partition_segments() {
                path.push(segment);
            }
            path.push(&info.file_name);
        } else {
            for segment in info.raw.split('/') {
                path.push(segment);
            }
        }
        path
    }

    /// Physical location of a key previously produced by `relative_path`
    #[must_use]
    pub fn physical_of_relative(&self, relative: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in relative.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    /// Express an absolute path under the root as a `/`-separated key
    pub fn relative_of(&self, physical: &Path) -> Result<String> {
        let rel = physical.strip_prefix(&self.root).map_err(|_| {
            Error::internal(format!(
                "{} is outside the local root",
                physical.display()
            ))
        })?;

        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                std::path::Component::Normal(name) => parts.push(
                    name.to_str()
                        .ok_or_else(|| Error::internal("non UTF-8 file name"))?
                        .to_string(),
                ),
                _ => return Err(Error::internal("unexpected path component")),
            }
        }
        Ok(parts.join("/"))
    }
}
