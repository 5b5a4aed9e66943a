// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Command line and environment configuration

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tierfs::{PushConfig, RemoteConfig, UploadLockMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LockMode {
    /// One upload at a time
    Global,
    /// Uploads of distinct objects run concurrently
    PerKey,
}

impl From<LockMode> for UploadLockMode {
    fn from(mode: LockMode) -> Self {
        match mode {
            LockMode::Global => UploadLockMode::Global,
            LockMode::PerKey => UploadLockMode::PerKey,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(name = "hivegate")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Directory holding the local tier
    #[arg(long, env = "LOCAL_ROOT", default_value = ".local/tmp")]
    pub local_root: PathBuf,

    /// S3-compatible endpoint URL
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    #[arg(long, env = "S3_ACCESS_KEY", hide_env_values = true)]
    pub s3_access_key: Option<String>,

    #[arg(long, env = "S3_SECRET_KEY", hide_env_values = true)]
    pub s3_secret_key: Option<String>,

    #[arg(long, env = "S3_REGION")]
    pub s3_region: Option<String>,

    /// Number of background push workers
    #[arg(long, env = "PUSH_WORKERS", default_value_t = 2)]
    pub push_workers: usize,

    /// Pending pushes held before new ones are dropped
    #[arg(long, env = "PUSH_QUEUE", default_value_t = 1024)]
    pub push_queue: usize,

    /// Extra attempts for a failed push
    #[arg(long, env = "PUSH_RETRIES", default_value_t = 0)]
    pub push_retries: usize,

    #[arg(long, env = "UPLOAD_LOCK", value_enum, default_value_t = LockMode::PerKey)]
    pub upload_lock: LockMode,

    #[arg(long, env = "PROBE_TIMEOUT_SECS", default_value_t = 5)]
    pub probe_timeout_secs: u64,

    #[arg(long, env = "PUSH_TIMEOUT_SECS", default_value_t = 30)]
    pub push_timeout_secs: u64,

    /// Bound on a pull-on-miss; unbounded when unset
    #[arg(long, env = "PULL_TIMEOUT_SECS")]
    pub pull_timeout_secs: Option<u64>,
}

impl Config {
    /// The remote tier settings, or `None` for local-only mode
    #[must_use]
    pub fn remote(&self) -> Option<RemoteConfig> {
        RemoteConfig::from_parts(
            self.s3_endpoint.clone(),
            self.s3_bucket.clone(),
            self.s3_access_key.clone(),
            self.s3_secret_key.clone(),
            self.s3_region.clone(),
        )
    }

    #[must_use]
    pub fn push(&self) -> PushConfig {
        PushConfig {
            workers: self.push_workers,
            queue_capacity: self.push_queue,
            retries: self.push_retries,
            attempt_timeout: Duration::from_secs(self.push_timeout_secs),
            lock_mode: self.upload_lock.into(),
        }
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    #[must_use]
    pub fn pull_timeout(&self) -> Option<Duration> {
        self.pull_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["hivegate"]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.local_root, PathBuf::from(".local/tmp"));
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.pull_timeout(), None);

        let push = config.push();
        assert_eq!(push.workers, 2);
        assert_eq!(push.attempt_timeout, Duration::from_secs(30));
        assert_eq!(push.lock_mode, UploadLockMode::PerKey);
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "hivegate",
            "--port",
            "8080",
            "--upload-lock",
            "global",
            "--push-retries",
            "3",
            "--pull-timeout-secs",
            "10",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.push().lock_mode, UploadLockMode::Global);
        assert_eq!(config.push().retries, 3);
        assert_eq!(config.pull_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_remote_needs_all_four_parts() {
        let partial = Config::try_parse_from([
            "hivegate",
            "--s3-endpoint",
            "http://localhost:9000",
            "--s3-bucket",
            "hive",
        ])
        .unwrap();
        assert!(partial.remote().is_none());

        let full = Config::try_parse_from([
            "hivegate",
            "--s3-endpoint",
            "http://localhost:9000",
            "--s3-bucket",
            "hive",
            "--s3-access-key",
            "ak",
            "--s3-secret-key",
            "sk",
        ])
        .unwrap();
        let remote = full.remote().unwrap();
        assert_eq!(remote.bucket, "hive");
    }
}
