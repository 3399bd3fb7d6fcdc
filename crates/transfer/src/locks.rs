use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

type LockMap = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// One async mutex per upload identifier.
///
/// Serializes metadata read-modify-write cycles and merges for a single
/// upload. Different uploads never contend. An entry lives only while some
/// task holds or waits on it, so abandoned uploads leave nothing behind.
#[derive(Debug, Clone, Default)]
pub struct SessionLocks {
    inner: LockMap,
}

/// Exclusive access to one upload; released on drop.
#[derive(Debug)]
pub struct SessionGuard {
    guard: Option<OwnedMutexGuard<()>>,
    upload_id: String,
    map: LockMap,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `upload_id`.
    pub async fn acquire(&self, upload_id: &str) -> SessionGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(upload_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        SessionGuard {
            guard: Some(lock.lock_owned().await),
            upload_id: upload_id.to_string(),
            map: self.inner.clone(),
        }
    }

    /// Number of uploads currently held or awaited.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only taken under the map lock, so a count of one means
        // no other task holds or waits on this mutex.
        if map
            .get(&self.upload_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.upload_id);
        }
    }
}
