//! Archive handle cache.
//!
//! Opening an archive means sniffing it and indexing its entries, so the
//! opened handle is kept and shared by later requests. The cache is keyed
//! by the root-joined archive path and guarantees:
//!
//! - at most one open in flight per path: concurrent callers wait for the
//!   first caller's result instead of opening the archive again
//! - failed opens are never cached, the next request retries
//! - at most `capacity` handles are kept, least recently used first out;
//!   an evicted handle stays alive while requests still hold it
//!
//! Slots whose open is still in flight are never evicted. While more than
//! `capacity` opens are pending at once the cache holds more slots than its
//! capacity, and it shrinks back as opened handles become evictable.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OnceCell;

use crate::archive::{ArchiveBackend, BackendOptions, open_archive};
use crate::error::{Error, Result};

/// An opened archive shared between requests.
pub type ArchiveHandle = Arc<dyn ArchiveBackend>;

type Slot = Arc<OnceCell<ArchiveHandle>>;

/// Default number of archives kept open.
pub const DEFAULT_CAPACITY: usize = 64;

/// Opened archives keyed by path, shared by every request.
///
/// Owned by the server state and injected into [`VirtualFs`](crate::vfs::VirtualFs);
/// there is no process-wide instance.
pub struct ArchiveCache {
    /// Unbounded map; `capacity` is enforced by [`evict_settled`]
    slots: Mutex<LruCache<PathBuf, Slot>>,
    capacity: NonZeroUsize,
    options: BackendOptions,
    opens: AtomicU64,
}

impl ArchiveCache {
    /// Create a cache keeping at most `capacity` opened archives, opening
    /// new ones with `options`.
    pub fn new(capacity: NonZeroUsize, options: BackendOptions) -> Self {
        Self {
            slots: Mutex::new(LruCache::unbounded()),
            capacity,
            options,
            opens: AtomicU64::new(0),
        }
    }

    /// Return the cached handle for `path`, opening the archive on a miss.
    pub async fn get_or_open(&self, path: &Path) -> Result<ArchiveHandle> {
        let slot = self.slot(path);

        let result = slot.get_or_try_init(|| self.open(path)).await.cloned();
        match result {
            Ok(_) => evict_settled(&mut self.slots.lock(), self.capacity.get()),
            Err(_) => self.discard_failed(path, &slot),
        }
        result
    }

    /// Find or create the slot for `path`, marking it most recently used.
    fn slot(&self, path: &Path) -> Slot {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(path) {
            return Arc::clone(slot);
        }

        let slot: Slot = Arc::new(OnceCell::new());
        slots.put(path.to_path_buf(), Arc::clone(&slot));
        evict_settled(&mut slots, self.capacity.get());
        slot
    }

    async fn open(&self, path: &Path) -> Result<ArchiveHandle> {
        self.opens.fetch_add(1, Ordering::Relaxed);

        let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(format!("{}", path.display())),
            _ => Error::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(Error::NotFound(format!("{} is not a file", path.display())));
        }

        match open_archive(path, &self.options).await {
            Ok(handle) => {
                tracing::info!("Opened {} archive {:?}", handle.format(), path);
                Ok(handle)
            }
            Err(e) => {
                tracing::warn!("Failed to open archive {:?}: {}", path, e);
                Err(e)
            }
        }
    }

    /// Remove an uninitialized slot once no other caller is waiting on it.
    fn discard_failed(&self, path: &Path, slot: &Slot) {
        let mut slots = self.slots.lock();
        let unused = slots.peek(path).is_some_and(|current| {
            // One reference held by the map, one by this caller
            Arc::ptr_eq(current, slot) && !current.initialized() && Arc::strong_count(current) == 2
        });
        if unused {
            slots.pop(path);
        }
    }

    /// Number of backend opens performed so far, failed ones included.
    pub fn open_count(&self) -> u64 {
        self.opens.load(Ordering::Relaxed)
    }

    /// Number of cached slots, pending opens included.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an opened handle for `path` is cached.
    pub fn contains(&self, path: &Path) -> bool {
        self.slots
            .lock()
            .peek(path)
            .is_some_and(|slot| slot.initialized())
    }

    /// Drop every cached handle.
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        let count = slots.len();
        slots.clear();
        tracing::info!("Closed {} cached archives", count);
    }
}

/// Drop least recently used opened handles until at most `capacity` slots
/// remain. Pending slots are skipped, so the loop stops early when only
/// pending slots are left over capacity.
fn evict_settled(slots: &mut LruCache<PathBuf, Slot>, capacity: usize) {
    while slots.len() > capacity {
        let victim = slots
            .iter()
            .rev()
            .find(|(_, slot)| slot.initialized())
            .map(|(path, _)| path.clone());
        match victim {
            Some(path) => {
                slots.pop(&path);
            }
            None => break,
        }
    }
}

impl Default for ArchiveCache {
    fn default() -> Self {
        Self::new(
            NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            BackendOptions::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> ArchiveCache {
        ArchiveCache::new(NonZeroUsize::new(capacity).unwrap(), BackendOptions::default())
    }

    /// Smallest valid zip: a bare end of central directory record.
    const EMPTY_ZIP: &[u8] = b"PK\x05\x06\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0";

    #[tokio::test]
    async fn missing_archive_is_not_found_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(4);

        let result = cache.get_or_open(&dir.path().join("nope.zip")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn second_request_reuses_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.zip");
        std::fs::write(&path, EMPTY_ZIP).unwrap();
        let cache = cache(4);

        let first = cache.get_or_open(&path).await.unwrap();
        let second = cache.get_or_open(&path).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.open_count(), 1);
        assert!(cache.contains(&path));
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("{i}.zip"));
                std::fs::write(&path, EMPTY_ZIP).unwrap();
                path
            })
            .collect();
        let cache = cache(2);

        let evicted = cache.get_or_open(&paths[0]).await.unwrap();
        cache.get_or_open(&paths[1]).await.unwrap();
        cache.get_or_open(&paths[2]).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&paths[0]));
        // Holders of an evicted handle can keep using it
        assert!(evicted.list_directory("").files.is_empty());

        cache.get_or_open(&paths[0]).await.unwrap();
        assert_eq!(cache.open_count(), 4);
    }

    #[tokio::test]
    async fn pending_open_survives_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("{i}.zip"));
                std::fs::write(&path, EMPTY_ZIP).unwrap();
                path
            })
            .collect();
        let cache = cache(2);

        // A slot handed out but not yet initialized stands for an open in flight
        let pending = cache.slot(&paths[0]);
        cache.get_or_open(&paths[1]).await.unwrap();
        cache.get_or_open(&paths[2]).await.unwrap();

        assert!(cache.slots.lock().contains(&paths[0]));
        assert!(!cache.contains(&paths[1]));
        assert_eq!(cache.len(), 2);

        // A later request for the pending path joins the same slot
        assert!(Arc::ptr_eq(&pending, &cache.slot(&paths[0])));
        cache.get_or_open(&paths[0]).await.unwrap();
        assert!(pending.initialized());
        assert_eq!(cache.open_count(), 3);
    }

    #[tokio::test]
    async fn all_pending_slots_may_exceed_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(1);

        let first = cache.slot(&dir.path().join("a.zip"));
        let second = cache.slot(&dir.path().join("b.zip"));
        assert_eq!(cache.len(), 2);
        assert!(!Arc::ptr_eq(&first, &second));

        let path = dir.path().join("c.zip");
        std::fs::write(&path, EMPTY_ZIP).unwrap();
        cache.get_or_open(&path).await.unwrap();
        // The new handle is the only evictable slot
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&path));
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.zip");
        std::fs::write(&path, EMPTY_ZIP).unwrap();
        let cache = cache(4);

        cache.get_or_open(&path).await.unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
