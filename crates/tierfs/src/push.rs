// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous push-on-write to the remote tier
//!
//! Writers hand a job to a bounded queue and return immediately. A fixed
//! pool of workers drains the queue, takes the upload lock for the job's
//! key and uploads the local file. Failures are logged and counted, never
//! reported back to the writer: the local copy is the object of record.

use crate::error::Error;
use crate::keyed_lock::KeyedLocks;
use crate::remote::RemoteStore;
use backon::{ExponentialBuilder, Retryable};
use diagnostics::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Lock key shared by every push in `Global` mode
const GLOBAL_LOCK_KEY: &str = "";

/// Scope of the upload mutual exclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum UploadLockMode {
    /// One push in flight process-wide
    Global,
    /// Pushes of the same key are serialized, distinct keys run concurrently
    #[default]
    PerKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Extra attempts after the first failure
    pub retries: usize,
    pub attempt_timeout: Duration,
    pub lock_mode: UploadLockMode,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 1024,
            retries: 0,
            attempt_timeout: Duration::from_secs(30),
            lock_mode: UploadLockMode::default(),
        }
    }
}

/// One object to replicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushJob {
    /// Remote key, relative to the local root
    pub key: String,
    /// Local file holding the content
    pub source: PathBuf,
}

/// Counters describing what the queue has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushStats {
    pub enqueued: u64,
    pub pushed: u64,
    pub failed: u64,
    /// Jobs refused because the queue was full or shut down
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    pushed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PushStats {
        PushStats {
            enqueued: self.enqueued.load(Ordering::SeqCst),
            pushed: self.pushed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }
}

struct Worker {
    remote: Arc<dyn RemoteStore>,
    locks: Arc<KeyedLocks>,
    counters: Arc<Counters>,
    config: PushConfig,
}

#[derive(Debug)]
pub struct PushQueue {
    sender: RwLock<Option<mpsc::Sender<PushJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl PushQueue {
    /// Spawn the worker pool on the current tokio runtime
    pub fn start(remote: Arc<dyn RemoteStore>, config: PushConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());
        let locks = Arc::new(KeyedLocks::new());

        let workers = (0..config.workers.max(1))
            .map(|id| {
                let worker = Worker {
                    remote: remote.clone(),
                    locks: locks.clone(),
                    counters: counters.clone(),
                    config: config.clone(),
                };
                let receiver = receiver.clone();
                tokio::spawn(async move { worker.run(id, receiver).await })
            })
            .collect();

        Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
        }
    }

    /// Hand a job to the workers without waiting
    ///
    /// Returns false when the job was dropped (queue full or shut down).
    pub fn enqueue(&self, job: PushJob) -> bool {
        let sent = {
            let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
            match guard.as_ref() {
                Some(sender) => sender.try_send(job).map_err(|e| match e {
                    mpsc::error::TrySendError::Full(job) => (job, "queue full"),
                    mpsc::error::TrySendError::Closed(job) => (job, "queue closed"),
                }),
                None => Err((job, "queue closed")),
            }
        };

        match sent {
            Ok(()) => {
                _ = self.counters.enqueued.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err((job, why)) => {
                _ = self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                let err = Error::push_failed(&job.key, why);
                warn!("Dropping push: {#[emit::as_display] err}");
                false
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> PushStats {
        self.counters.snapshot()
    }

    /// Stop accepting jobs and wait until every queued push has finished
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let workers: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        let count = workers.len();
        for handle in workers {
            if let Err(join_err) = handle.await {
                warn!("Push worker ended abnormally: {#[emit::as_display] join_err}");
            }
        }
        debug!("Push queue drained by {count} workers");
    }
}

impl Worker {
    async fn run(self, id: usize, receiver: Arc<Mutex<mpsc::Receiver<PushJob>>>) {
        loop {
            // The receiver lock is released before the upload starts
            let job = receiver.lock().await.recv().await;
            let Some(job) = job else {
                debug!("Push worker {id} exiting");
                return;
            };
            self.push(job).await;
        }
    }

    async fn push(&self, job: PushJob) {
        let lock_key = match self.config.lock_mode {
            UploadLockMode::Global => GLOBAL_LOCK_KEY,
            UploadLockMode::PerKey => job.key.as_str(),
        };
        let _guard = self.locks.lock(lock_key).await;

        let key = job.key.as_str();
        debug!("Pushing {key} to remote");

        let remote = &self.remote;
        let job = &job;
        let limit = self.config.attempt_timeout;
        let attempt = move || async move {
            match tokio::time::timeout(limit, remote.push(&job.key, &job.source)).await {
                Ok(result) => result,
                Err(_) => Err(Error::push_failed(
                    &job.key,
                    format!("timed out after {}s", limit.as_secs()),
                )),
            }
        };

        let result = attempt
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(100))
                    .with_max_times(self.config.retries),
            )
            .notify(|err: &Error, delay: Duration| {
                let delay_ms = delay.as_millis() as u64;
                warn!("Retrying push in {delay_ms}ms: {#[emit::as_display] err}");
            })
            .await;

        match result {
            Ok(()) => {
                _ = self.counters.pushed.fetch_add(1, Ordering::SeqCst);
                info!("Pushed {key} to remote");
            }
            Err(err) => {
                _ = self.counters.failed.fetch_add(1, Ordering::SeqCst);
                warn!("Push of {key} failed: {#[emit::as_display] err}");
            }
        }
    }
}
