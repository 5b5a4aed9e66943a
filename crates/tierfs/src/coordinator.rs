// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Coordination between the local and remote tiers
//!
//! Reads are served from the local tier and fall back to a synchronous
//! pull from the remote tier on a miss. Writes land in the local tier and
//! are replicated to the remote tier in the background.

use crate::error::{Error, Result};
use crate::hive::{PathResolver, parse_hive_path};
use crate::keyed_lock::KeyedLocks;
use crate::local::{LocalObject, LocalTier};
use crate::push::{PushConfig, PushJob, PushQueue, PushStats};
use crate::remote::RemoteStore;
use crate::wildcard::{WildcardAggregator, WildcardOutcome};
use diagnostics::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Remote tier wiring for a coordinator
#[derive(Debug)]
pub struct RemoteTier {
    pub store: Arc<dyn RemoteStore>,
    pub push: PushConfig,
    /// Upper bound for a pull-on-miss; `None` waits for the remote
    pub pull_timeout: Option<Duration>,
}

impl RemoteTier {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            push: PushConfig::default(),
            pull_timeout: None,
        }
    }
}

#[derive(Debug)]
struct Remote {
    store: Arc<dyn RemoteStore>,
    queue: PushQueue,
    pulls: KeyedLocks,
    pull_timeout: Option<Duration>,
}

/// Serves reads and writes over the two tiers
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct TierCoordinator {
    local: LocalTier,
    aggregator: WildcardAggregator,
    remote: Option<Remote>,
}

impl TierCoordinator {
    /// Build a coordinator; spawns push workers when a remote is given
    pub fn new(local: LocalTier, remote: Option<RemoteTier>) -> Self {
        let remote = remote.map(|tier| Remote {
            queue: PushQueue::start(tier.store.clone(), tier.push),
            store: tier.store,
            pulls: KeyedLocks::new(),
            pull_timeout: tier.pull_timeout,
        });

        Self {
            aggregator: WildcardAggregator::new(local.clone()),
            local,
            remote,
        }
    }

    #[must_use]
    pub fn local(&self) -> &LocalTier {
        &self.local
    }

    #[must_use]
    pub fn resolver(&self) -> &PathResolver {
        self.local.resolver()
    }

    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Open the object at `logical_path`, pulling it from the remote on a miss
    pub async fn get(&self, logical_path: &str) -> Result<LocalObject> {
        let info = parse_hive_path(logical_path)?;
        let physical = self.resolver().physical_of(&info);

        match self.local.open(&physical).await {
            Ok(object) => return Ok(object),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let Some(remote) = &self.remote else {
            return Err(Error::not_found(info.relative_path()));
        };

        let key = info.relative_path();
        self.pull(remote, &key, &physical).await?;
        self.local.open(&physical).await
    }

    /// Store the content of `reader` at `logical_path`
    ///
    /// Returns the path relative to the local root once the local write is
    /// complete. Replication to the remote tier happens afterwards.
    pub async fn put<R>(&self, logical_path: &str, reader: &mut R) -> Result<String>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let info = parse_hive_path(logical_path)?;
        let physical = self.resolver().physical_of(&info);
        let key = info.relative_path();

        let written = self.local.write(&physical, reader).await?;
        info!("Stored {#[emit::as_display] key} ({written} bytes)");

        if let Some(remote) = &self.remote {
            _ = remote.queue.enqueue(PushJob {
                key: key.clone(),
                source: physical,
            });
        }
        Ok(key)
    }

    /// Open an object already known to exist locally (no remote fallback)
    pub async fn open_local(&self, relative: &str) -> Result<LocalObject> {
        let physical = self.resolver().physical_of_relative(relative);
        self.local.open(&physical).await
    }

    /// Expand a wildcard path against the local tier
    pub async fn wildcard(&self, logical_path: &str, is_head: bool) -> Result<WildcardOutcome> {
        let aggregator = self.aggregator.clone();
        let logical_path = logical_path.to_string();
        tokio::task::spawn_blocking(move || aggregator.resolve(&logical_path, is_head))
            .await
            .map_err(|e| Error::internal(format!("wildcard task failed: {e}")))?
    }

    #[must_use]
    pub fn push_stats(&self) -> PushStats {
        self.remote
            .as_ref()
            .map(|r| r.queue.stats())
            .unwrap_or_default()
    }

    /// Stop accepting pushes and wait for queued ones to finish
    pub async fn shutdown(&self) {
        if let Some(remote) = &self.remote {
            remote.queue.shutdown().await;
        }
    }

    /// Fetch `key` into the local tier, at most once per concurrent miss
    ///
    /// Every failure is reported as `NotFound`; the staging file is removed.
    async fn pull(&self, remote: &Remote, key: &str, physical: &Path) -> Result<()> {
        let _guard = remote.pulls.lock(key).await;

        // Another request may have completed the pull while we waited
        if self.local.stat(physical).await?.is_some() {
            debug!("Pull of {key} already satisfied");
            return Ok(());
        }

        let mut staged = match self.local.stage(physical).await {
            Ok(staged) => staged,
            Err(reason) => {
                warn!("Pull of {key} failed: {#[emit::as_display] reason}");
                return Err(Error::not_found(key));
            }
        };

        let fetch = remote.store.fetch(key, staged.writer());
        let outcome = match remote.pull_timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result,
                Err(_) => Err(Error::RemoteUnavailable(format!(
                    "pull timed out after {}s",
                    limit.as_secs()
                ))),
            },
            None => fetch.await,
        };

        // A local write that landed during the fetch is newer than the remote copy
        let outcome = match outcome {
            Ok(bytes) => match staged.commit_if_absent().await {
                Ok(true) => Ok(bytes),
                Ok(false) => {
                    debug!("Pull of {key} superseded by a local write");
                    return Ok(());
                }
                Err(e) => Err(e),
            },
            Err(e) => {
                staged.discard().await;
                Err(e)
            }
        };

        match outcome {
            Ok(bytes) => {
                info!("Pulled {key} from remote ({bytes} bytes)");
                Ok(())
            }
            Err(reason) => {
                warn!("Pull of {key} failed: {#[emit::as_display] reason}");
                Err(Error::not_found(key))
            }
        }
    }
}
