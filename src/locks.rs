//! Per-output-directory mutual exclusion.
//!
//! Requests that write into the same directory are serialized; requests on
//! different directories run side by side.

use crate::workdir::normalize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Registry of directory locks.
#[derive(Debug, Clone, Default)]
pub struct DirLocks {
    slots: Arc<Mutex<HashMap<PathBuf, Slot>>>,
}

/// Held while a request owns a directory.
#[derive(Debug)]
pub struct DirGuard {
    key: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
    locks: DirLocks,
}

impl DirLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `dir`.
    ///
    /// Keys are symlink-resolved, so a directory locked before it existed
    /// still excludes a later request on the same path.
    pub async fn acquire(&self, dir: &Path) -> DirGuard {
        let key = normalize(dir);
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.entry(key.clone()).or_default().clone()
        };

        debug!("Waiting for lock on {}", key.display());
        let guard = slot.lock_owned().await;

        DirGuard {
            key,
            guard: Some(guard),
            locks: self.clone(),
        }
    }

    /// Number of directories currently tracked.
    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self.locks.slots.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map itself still references an idle slot.
        if let Some(slot) = slots.get(&self.key) {
            if Arc::strong_count(slot) == 1 {
                slots.remove(&self.key);
            }
        }
    }
}
