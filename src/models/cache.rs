//! Epoch-versioned cache cells.
//!
//! Derived values (on-time status, product group) are cached per activity.
//! Each entry remembers the scenario cache epoch it was computed under; the
//! scenario bumps the epoch whenever simulation is reinitialized or need
//! dates change, which makes every older entry stale at once.
//!
//! A cell is guarded by its own mutex. Concurrent readers that miss block on
//! the same lock, so exactly one computes and the others see its result.

use parking_lot::Mutex;
use std::fmt;

/// A single cached value tagged with the epoch it was computed under.
pub struct CacheCell<T> {
    slot: Mutex<Option<(u64, T)>>,
}

impl<T: Clone> CacheCell<T> {
    /// Creates an empty cell.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached value for `epoch`, computing it on a miss.
    pub fn get_or_compute(&self, epoch: u64, compute: impl FnOnce() -> T) -> T {
        let mut slot = self.slot.lock();
        if let Some((cached_epoch, value)) = slot.as_ref() {
            if *cached_epoch == epoch {
                return value.clone();
            }
        }
        let value = compute();
        tracing::trace!(epoch, "cache cell recomputed");
        *slot = Some((epoch, value.clone()));
        value
    }

    /// The cached value if it belongs to `epoch`.
    pub fn peek(&self, epoch: u64) -> Option<T> {
        self.slot
            .lock()
            .as_ref()
            .filter(|(e, _)| *e == epoch)
            .map(|(_, v)| v.clone())
    }

    /// Drops the cached value.
    pub fn invalidate(&self) {
        *self.slot.lock() = None;
    }
}

impl<T: Clone> Default for CacheCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones start empty.
impl<T: Clone> Clone for CacheCell<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// Caches never take part in record equality.
impl<T> PartialEq for CacheCell<T> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T> Eq for CacheCell<T> {}

impl<T: fmt::Debug> fmt::Debug for CacheCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot.try_lock() {
            Some(slot) => f.debug_tuple("CacheCell").field(&*slot).finish(),
            None => f.write_str("CacheCell(<locked>)"),
        }
    }
}
