// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Local (hot) tier backed by a host directory tree
//!
//! Objects are plain files under the root. Writes go through a staging file
//! in the destination directory that is renamed into place only once the
//! full content has been written, so readers never observe a partial object
//! and a cancelled writer leaves nothing behind.

use crate::error::{Error, Result};
use crate::hive::PathResolver;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// File name prefix of in-progress staging files
pub const STAGING_PREFIX: &str = ".tierfs-staging-";

/// Metadata of an object stored in the local tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// `/`-separated path relative to the local root
    pub relative_path: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// An open local object ready to be streamed
#[derive(Debug)]
pub struct LocalObject {
    pub file: tokio::fs::File,
    pub meta: ObjectMeta,
}

/// The local tier rooted at a host directory
#[derive(Debug, Clone)]
pub struct LocalTier {
    resolver: PathResolver,
}

impl LocalTier {
    /// Create the root directory (and ancestors) if needed and open the tier
    ///
    /// Idempotent. Fails if the root exists and is not a directory.
    pub async fn ensure_root<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| Error::io(&root, e))?;

        let md = tokio::fs::metadata(&root)
            .await
            .map_err(|e| Error::io(&root, e))?;
        if !md.is_dir() {
            return Err(Error::internal(format!(
                "local root {} is not a directory",
                root.display()
            )));
        }

        Ok(Self {
            resolver: PathResolver::new(root),
        })
    }

    #[must_use]
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    /// Stat a physical location; `None` if no regular file is there
    pub async fn stat(&self, physical: &Path) -> Result<Option<ObjectMeta>> {
        match tokio::fs::metadata(physical).await {
            Ok(md) if md.is_file() => Ok(Some(self.meta_of(physical, &md)?)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(physical, e)),
        }
    }

    /// Open a regular file for streaming
    ///
    /// Missing files and directories are both reported as `NotFound`.
    pub async fn open(&self, physical: &Path) -> Result<LocalObject> {
        let file = tokio::fs::File::open(physical)
            .await
            .map_err(|e| Error::io(physical, e))?;
        let md = file
            .metadata()
            .await
            .map_err(|e| Error::io(physical, e))?;
        if !md.is_file() {
            return Err(Error::not_found(self.resolver.relative_of(physical)?));
        }

        let meta = self.meta_of(physical, &md)?;
        Ok(LocalObject { file, meta })
    }

    /// Replace the object at `physical` with the full content of `reader`
    pub async fn write<R>(&self, physical: &Path, reader: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut staged = self.stage(physical).await?;
        let written = tokio::io::copy(reader, staged.writer())
            .await
            .map_err(|e| Error::io(physical, e))?;
        staged.commit().await?;
        Ok(written)
    }

    /// Create parent directories and a staging file next to `physical`
    pub async fn stage(&self, physical: &Path) -> Result<StagedFile> {
        let parent = physical
            .parent()
            .ok_or_else(|| Error::internal("object path has no parent"))?;
        let created = first_missing_ancestor(parent).await;

        // A concurrent discard may prune the directory between the two steps
        let mut attempts = 0;
        let temp = loop {
            attempts += 1;
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
            match tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempfile_in(parent)
            {
                Ok(temp) => break temp,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound && attempts < 3 => {}
                Err(e) => return Err(Error::io(parent, e)),
            }
        };
        let handle = temp.as_file().try_clone().map_err(|e| Error::io(parent, e))?;

        Ok(StagedFile {
            file: tokio::fs::File::from_std(handle),
            temp,
            dest: physical.to_path_buf(),
            created,
        })
    }

    fn meta_of(&self, physical: &Path, md: &std::fs::Metadata) -> Result<ObjectMeta> {
        Ok(ObjectMeta {
            relative_path: self.resolver.relative_of(physical)?,
            size: md.len(),
            modified: md
                .modified()
                .map_err(|e| Error::io(physical, e))?,
        })
    }
}

/// Topmost directory on the way to `dir` that does not exist yet
async fn first_missing_ancestor(dir: &Path) -> Option<PathBuf> {
    let mut missing = None;
    let mut current = Some(dir);
    while let Some(d) = current {
        if tokio::fs::try_exists(d).await.unwrap_or(false) {
            break;
        }
        missing = Some(d.to_path_buf());
        current = d.parent();
    }
    missing
}

/// A staging file that becomes the destination object on commit
///
/// Dropping it without committing removes the staging file.
#[derive(Debug)]
pub struct StagedFile {
    file: tokio::fs::File,
    temp: tempfile::NamedTempFile,
    dest: PathBuf,
    /// Topmost directory created by `stage`, if any
    created: Option<PathBuf>,
}

impl StagedFile {
    pub fn writer(&mut self) -> &mut (dyn AsyncWrite + Unpin + Send) {
        &mut self.file
    }

    /// Flush and atomically rename over the destination
    pub async fn commit(self) -> Result<()> {
        let (temp, dest) = self.finish().await?;
        _ = temp
            .persist(&dest)
            .map_err(|e| Error::io(&dest, e.error))?;
        Ok(())
    }

    /// Flush and move into place only if nothing exists at the destination
    ///
    /// Returns false, discarding the staged content, when the destination
    /// was created in the meantime.
    pub async fn commit_if_absent(self) -> Result<bool> {
        let (temp, dest) = self.finish().await?;
        match temp.persist_noclobber(&dest) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(Error::io(&dest, e.error)),
        }
    }

    /// Remove the staging file and the empty directories `stage` created
    pub async fn discard(self) {
        let StagedFile {
            file,
            temp,
            dest,
            created,
        } = self;
        drop(file);
        drop(temp);

        let Some(top) = created else {
            return;
        };
        let mut dir = dest.parent();
        while let Some(d) = dir {
            // Fails once a directory is not empty, e.g. a concurrent write
            if tokio::fs::remove_dir(d).await.is_err() || d == top.as_path() {
                break;
            }
            dir = d.parent();
        }
    }

    async fn finish(mut self) -> Result<(tempfile::NamedTempFile, PathBuf)> {
        self.file
            .flush()
            .await
            .map_err(|e| Error::io(&self.dest, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| Error::io(&self.dest, e))?;
        drop(self.file);
        Ok((self.temp, self.dest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_ensure_root_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("a/b/c");
        _ = LocalTier::ensure_root(&root).await.unwrap();
        _ = LocalTier::ensure_root(&root).await.unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_ensure_root_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(LocalTier::ensure_root(&file).await.is_err());
    }

    #[tokio::test]
    async fn test_write_then_open() {
        let dir = TempDir::new().unwrap();
        let tier = LocalTier::ensure_root(dir.path()).await.unwrap();
        let physical = tier.resolver().physical_location("k=v/obj.bin").unwrap();

        let mut body: &[u8] = b"hello tier";
        let n = tier.write(&physical, &mut body).await.unwrap();
        assert_eq!(n, 10);

        let mut obj = tier.open(&physical).await.unwrap();
        assert_eq!(obj.meta.size, 10);
        assert_eq!(obj.meta.relative_path, "k=v/obj.bin");
        let mut content = String::new();
        _ = obj.file.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "hello tier");
    }

    #[tokio::test]
    async fn test_dropped_stage_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let tier = LocalTier::ensure_root(dir.path()).await.unwrap();
        let physical = tier.resolver().physical_location("k=v/obj.bin").unwrap();

        let mut staged = tier.stage(&physical).await.unwrap();
        staged.writer().write_all(b"partial").await.unwrap();
        drop(staged);

        let parent = physical.parent().unwrap();
        assert_eq!(std::fs::read_dir(parent).unwrap().count(), 0);
        assert!(tier.stat(&physical).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_if_absent_keeps_existing_object() {
        let dir = TempDir::new().unwrap();
        let tier = LocalTier::ensure_root(dir.path()).await.unwrap();
        let physical = tier.resolver().physical_location("k=v/obj.bin").unwrap();

        let mut staged = tier.stage(&physical).await.unwrap();
        staged.writer().write_all(b"older").await.unwrap();
        let mut body: &[u8] = b"newer";
        _ = tier.write(&physical, &mut body).await.unwrap();

        assert!(!staged.commit_if_absent().await.unwrap());
        assert_eq!(std::fs::read(&physical).unwrap(), b"newer");
        assert_eq!(std::fs::read_dir(physical.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_directories_are_not_objects() {
        let dir = TempDir::new().unwrap();
        let tier = LocalTier::ensure_root(dir.path()).await.unwrap();
        std::fs::create_dir_all(dir.path().join("k=v")).unwrap();
        let physical = dir.path().join("k=v");

        assert!(tier.stat(&physical).await.unwrap().is_none());
        let err = tier.open(&physical).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
