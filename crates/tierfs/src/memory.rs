// SPDX-FileCopyrightText: 2026 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory remote tier, primarily for tests
//!
//! Counts every call so tests can assert how often the cold tier was
//! contacted, and can be told to fail pushes or to slow operations down.

use crate::error::{Error, Result};
use crate::remote::RemoteStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryRemote {
    objects: RwLock<HashMap<String, Bytes>>,
    fetch_calls: AtomicUsize,
    push_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    fail_pushes: AtomicBool,
    fail_probe: AtomicBool,
    /// Artificial latency in milliseconds applied to fetch and push
    delay_ms: AtomicU64,
    pushes_in_flight: AtomicUsize,
    max_pushes_in_flight: AtomicUsize,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as a push
    pub async fn insert(&self, key: &str, content: impl Into<Bytes>) {
        _ = self
            .objects
            .write()
            .await
            .insert(key.to_string(), content.into());
    }

    pub async fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Highest number of pushes observed running at the same time
    pub fn max_concurrent_pushes(&self) -> usize {
        self.max_pushes_in_flight.load(Ordering::SeqCst)
    }

    pub fn set_fail_pushes(&self, fail: bool) {
        self.fail_pushes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_probe(&self, fail: bool) {
        self.fail_probe.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn pause(&self) {
        let ms = self.delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

/// Counts a running push until dropped, including when the push is cancelled
struct InFlight<'a>(usize, &'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        Self(counter.fetch_add(1, Ordering::SeqCst) + 1, counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        _ = self.1.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn probe(&self) -> Result<()> {
        _ = self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_probe.load(Ordering::SeqCst) {
            return Err(Error::RemoteUnavailable("bucket does not exist".to_string()));
        }
        Ok(())
    }

    async fn fetch(&self, key: &str, dest: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u64> {
        _ = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let content = self
            .object(key)
            .await
            .ok_or_else(|| Error::not_found(key))?;
        dest.write_all(&content)
            .await
            .map_err(|e| Error::internal(e.to_string()))?;
        Ok(content.len() as u64)
    }

    async fn push(&self, key: &str, source: &Path) -> Result<()> {
        _ = self.push_calls.fetch_add(1, Ordering::SeqCst);
        let running = InFlight::enter(&self.pushes_in_flight);
        _ = self.max_pushes_in_flight.fetch_max(running.0, Ordering::SeqCst);

        self.pause().await;
        let result = if self.fail_pushes.load(Ordering::SeqCst) {
            Err(Error::push_failed(key, "injected failure"))
        } else {
            match tokio::fs::read(source).await {
                Ok(content) => {
                    self.insert(key, content).await;
                    Ok(())
                }
                Err(e) => Err(Error::io(source, e)),
            }
        };

        drop(running);
        result
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
