mod push;

use crate::coordinator::{RemoteTier, TierCoordinator};
use crate::local::LocalTier;
use crate::memory::MemoryRemote;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A coordinator over a fresh temp directory, backed by a memory remote
async fn tiered() -> (TempDir, Arc<MemoryRemote>, TierCoordinator) {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    let local = LocalTier::ensure_root(dir.path()).await.unwrap();
    let coordinator = TierCoordinator::new(local, Some(RemoteTier::new(remote.clone())));
    (dir, remote, coordinator)
}

/// Every regular file under `root`, relative and sorted
fn files_under(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}
