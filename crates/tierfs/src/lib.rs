// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Tiered, hive-partitioned object storage
//!
//! Objects are addressed by logical paths whose intermediate segments may
//! encode `key=value` partitions. They live in a local directory tree (the
//! hot tier) and are replicated to an S3-compatible bucket (the cold tier).
//!
//! # Architecture
//!
//! - **PathResolver** (`hive`): logical path to partitions, leaf, physical
//!   location and wildcard template; partitions are laid out in key order
//! - **LocalTier** (`local`): the directory tree, with staged atomic writes
//! - **RemoteStore** (`remote`): the cold tier; `ObjectStoreRemote` talks S3
//!   through `object_store`, `MemoryRemote` (`memory`) backs the tests
//! - **TierCoordinator** (`coordinator`): pull-on-miss reads and
//!   push-on-write replication
//! - **PushQueue** (`push`): bounded queue and worker pool running pushes
//!   under the upload lock
//! - **WildcardAggregator** (`wildcard`): glob expansion over the local tier
//!   and size/mtime/listing aggregation
//!
//! # Usage
//!
//! ```no_run
//! # async fn example() -> tierfs::Result<()> {
//! use tierfs::{LocalTier, TierCoordinator};
//!
//! let local = LocalTier::ensure_root("/var/lib/hivegate").await?;
//! let coordinator = TierCoordinator::new(local, None);
//!
//! let mut body: &[u8] = b"{\"a\":1}";
//! let key = coordinator.put("year=2024/month=01/data.json", &mut body).await?;
//! assert_eq!(key, "month=01/year=2024/data.json");
//!
//! let object = coordinator.get("month=01/year=2024/data.json").await?;
//! assert_eq!(object.meta.size, 7);
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod error;
pub mod hive;
mod keyed_lock;
mod local;
pub mod memory;
mod push;
mod remote;
mod wildcard;

#[cfg(test)]
mod tests;

pub use coordinator::{RemoteTier, TierCoordinator};
pub use error::{Error, ErrorClass, Result};
pub use hive::{HivePathInfo, PathResolver, is_wildcard, parse_hive_path};
pub use keyed_lock::{KeyGuard, KeyedLocks};
pub use local::{LocalObject, LocalTier, ObjectMeta, STAGING_PREFIX, StagedFile};
pub use push::{PushConfig, PushJob, PushQueue, PushStats, UploadLockMode};
pub use remote::{DEFAULT_REGION, ObjectStoreRemote, RemoteConfig, RemoteStore, probe_remote};
pub use wildcard::{MatchedObject, WildcardAggregator, WildcardOutcome, aggregate};
