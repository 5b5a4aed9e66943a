use crate::memory::MemoryRemote;
use crate::push::{PushConfig, PushJob, PushQueue, UploadLockMode};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn sources(dir: &TempDir, count: usize) -> Vec<PushJob> {
    (0..count)
        .map(|i| {
            let source: PathBuf = dir.path().join(format!("file{i}.txt"));
            std::fs::write(&source, format!("content {i}")).unwrap();
            PushJob {
                key: format!("n={i}/file.txt"),
                source,
            }
        })
        .collect()
}

#[tokio::test]
async fn test_queue_drains_on_shutdown() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    let queue = PushQueue::start(remote.clone(), PushConfig::default());

    for job in sources(&dir, 5) {
        assert!(queue.enqueue(job));
    }
    queue.shutdown().await;

    assert_eq!(remote.keys().await.len(), 5);
    assert_eq!(
        remote.object("n=3/file.txt").await.unwrap().as_ref(),
        b"content 3"
    );
    let stats = queue.stats();
    assert_eq!(stats.enqueued, 5);
    assert_eq!(stats.pushed, 5);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_enqueue_after_shutdown_is_dropped() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    let queue = PushQueue::start(remote.clone(), PushConfig::default());
    queue.shutdown().await;

    let job = sources(&dir, 1).remove(0);
    assert!(!queue.enqueue(job));
    assert_eq!(queue.stats().dropped, 1);
    assert_eq!(remote.push_calls(), 0);
}

#[tokio::test]
async fn test_full_queue_drops_without_waiting() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    remote.set_delay(Duration::from_millis(20));
    let config = PushConfig {
        workers: 1,
        queue_capacity: 1,
        ..PushConfig::default()
    };
    let queue = PushQueue::start(remote.clone(), config);

    // No await between the calls: the single worker cannot take anything yet
    let accepted = sources(&dir, 5)
        .into_iter()
        .filter(|job| queue.enqueue(job.clone()))
        .count();
    assert_eq!(accepted, 1);

    queue.shutdown().await;
    let stats = queue.stats();
    assert_eq!(stats.enqueued, 1);
    assert_eq!(stats.dropped, 4);
    assert_eq!(stats.pushed, 1);
}

#[tokio::test]
async fn test_global_lock_serializes_pushes() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    remote.set_delay(Duration::from_millis(20));
    let config = PushConfig {
        workers: 4,
        lock_mode: UploadLockMode::Global,
        ..PushConfig::default()
    };
    let queue = PushQueue::start(remote.clone(), config);

    for job in sources(&dir, 4) {
        assert!(queue.enqueue(job));
    }
    queue.shutdown().await;

    assert_eq!(remote.push_calls(), 4);
    assert_eq!(remote.max_concurrent_pushes(), 1);
}

#[tokio::test]
async fn test_per_key_lock_allows_distinct_keys() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    remote.set_delay(Duration::from_millis(50));
    let config = PushConfig {
        workers: 4,
        lock_mode: UploadLockMode::PerKey,
        ..PushConfig::default()
    };
    let queue = PushQueue::start(remote.clone(), config);

    for job in sources(&dir, 4) {
        assert!(queue.enqueue(job));
    }
    queue.shutdown().await;

    assert_eq!(remote.push_calls(), 4);
    assert!(remote.max_concurrent_pushes() > 1);
}

#[tokio::test]
async fn test_per_key_lock_serializes_same_key() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    remote.set_delay(Duration::from_millis(20));
    let config = PushConfig {
        workers: 4,
        ..PushConfig::default()
    };
    let queue = PushQueue::start(remote.clone(), config);

    let job = sources(&dir, 1).remove(0);
    for _ in 0..4 {
        assert!(queue.enqueue(job.clone()));
    }
    queue.shutdown().await;

    assert_eq!(remote.push_calls(), 4);
    assert_eq!(remote.max_concurrent_pushes(), 1);
}

#[tokio::test]
async fn test_retries_then_counts_failure() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    remote.set_fail_pushes(true);
    let config = PushConfig {
        workers: 1,
        retries: 2,
        ..PushConfig::default()
    };
    let queue = PushQueue::start(remote.clone(), config);

    assert!(queue.enqueue(sources(&dir, 1).remove(0)));
    queue.shutdown().await;

    assert_eq!(remote.push_calls(), 3);
    let stats = queue.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pushed, 0);
}

#[tokio::test]
async fn test_attempt_timeout_counts_failure() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    remote.set_delay(Duration::from_millis(500));
    let config = PushConfig {
        workers: 1,
        attempt_timeout: Duration::from_millis(20),
        ..PushConfig::default()
    };
    let queue = PushQueue::start(remote.clone(), config);

    assert!(queue.enqueue(sources(&dir, 1).remove(0)));
    queue.shutdown().await;

    assert_eq!(queue.stats().failed, 1);
    assert!(remote.keys().await.is_empty());
}

#[tokio::test]
async fn test_timed_out_push_is_not_counted_as_running() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    remote.set_delay(Duration::from_millis(100));
    let config = PushConfig {
        workers: 1,
        attempt_timeout: Duration::from_millis(20),
        ..PushConfig::default()
    };
    let queue = PushQueue::start(remote.clone(), config);
    let mut jobs = sources(&dir, 2);
    assert!(queue.enqueue(jobs.remove(0)));
    queue.shutdown().await;
    assert_eq!(queue.stats().failed, 1);

    remote.set_delay(Duration::ZERO);
    let config = PushConfig {
        workers: 1,
        ..PushConfig::default()
    };
    let queue = PushQueue::start(remote.clone(), config);
    assert!(queue.enqueue(jobs.remove(0)));
    queue.shutdown().await;

    assert_eq!(queue.stats().pushed, 1);
    assert_eq!(remote.max_concurrent_pushes(), 1);
}
