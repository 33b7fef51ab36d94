//! Lock-free runtime configuration hand-off.
//!
//! A [`ConfigSlot`] holds the current immutable configuration of one plugin
//! instance. The control thread builds a complete configuration and
//! [`publish`](ConfigSlot::publish)es it with a single atomic pointer swap;
//! the audio thread [`read`](ConfigSlot::read)s it once per cycle without
//! locking or allocating.
//!
//! # Reclamation
//!
//! A superseded configuration is moved to a retire list instead of being
//! dropped. It is freed by a later `publish` or an explicit
//! [`reclaim`](ConfigSlot::reclaim) once [`is_reclaimable`] holds: the retire
//! list owns the only remaining reference. Audio-side snapshots count as
//! references, so a configuration captured by an in-flight `read` is never
//! freed, whatever the publish rate. Since the retire list always keeps one
//! reference until that point, dropping a [`Snapshot`] on the audio thread
//! can never be the final release.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::ConfigSlot;
//!
//! let slot = ConfigSlot::new();
//! assert!(slot.read().get().is_none());
//!
//! slot.publish(vec![1.0_f32, 2.0]);
//! let snapshot = slot.read();
//! slot.publish(vec![3.0]);
//!
//! // The old configuration stays alive while the snapshot is held.
//! assert_eq!(snapshot.get(), Some(&vec![1.0, 2.0]));
//! assert_eq!(slot.pending(), 1);
//!
//! drop(snapshot);
//! assert_eq!(slot.reclaim(), 1);
//! assert_eq!(slot.read().get(), Some(&vec![3.0]));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::{ArcSwapOption, Guard};
use parking_lot::Mutex;

/// Whether a retired configuration can be freed.
///
/// True when `retired` is the sole owner: no audio-side [`Snapshot`] and no
/// control-side [`ConfigSlot::peek`] handle refers to it any more.
pub fn is_reclaimable<T>(retired: &Arc<T>) -> bool {
    Arc::strong_count(retired) == 1
}

/// The configuration observed by one `read`.
///
/// Keeps the configuration alive for as long as it is held.
pub struct Snapshot<T>(Guard<Option<Arc<T>>>);

impl<T> Snapshot<T> {
    /// The configuration, or `None` if nothing was published yet.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.0.as_deref()
    }
}

impl<T: fmt::Debug> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Snapshot").field(&self.get()).finish()
    }
}

/// Single current configuration plus deferred reclamation of old ones.
///
/// `publish`, `peek`, `clear` and `reclaim` belong to the control role;
/// `read` belongs to the audio role. Concurrent publishers are serialized
/// internally (last write wins); readers never wait for them.
pub struct ConfigSlot<T> {
    current: ArcSwapOption<T>,
    retired: Mutex<Vec<Arc<T>>>,
    published: AtomicU64,
    reclaimed: AtomicU64,
}

impl<T> ConfigSlot<T> {
    /// Empty slot.
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
            retired: Mutex::new(Vec::new()),
            published: AtomicU64::new(0),
            reclaimed: AtomicU64::new(0),
        }
    }

    /// Make `config` current.
    ///
    /// The previous configuration is retired, and every retired configuration
    /// that is no longer referenced is freed here, on the calling thread.
    pub fn publish(&self, config: T) {
        let config = Arc::new(config);
        let mut retired = self.retired.lock();
        if let Some(old) = self.current.swap(Some(config)) {
            retired.push(old);
        }
        self.published.fetch_add(1, Ordering::Release);
        Self::sweep(&mut retired, &self.reclaimed);

        #[cfg(feature = "tracing")]
        tracing::trace!(
            published = self.published.load(Ordering::Relaxed),
            pending = retired.len(),
            "config_slot: publish"
        );
    }

    /// Remove the current configuration; later reads see `None`.
    pub fn clear(&self) {
        let mut retired = self.retired.lock();
        if let Some(old) = self.current.swap(None) {
            retired.push(old);
        }
        Self::sweep(&mut retired, &self.reclaimed);
    }

    /// Current configuration, for the audio role.
    ///
    /// Lock-free and, once the calling thread has registered with the
    /// underlying swap, allocation-free.
    #[inline]
    pub fn read(&self) -> Snapshot<T> {
        Snapshot(self.current.load())
    }

    /// Owned handle to the current configuration, for the control role.
    ///
    /// Used when deriving a new configuration from the previous one.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.current.load_full()
    }

    /// Free every retired configuration that is no longer referenced.
    ///
    /// Returns how many were freed.
    pub fn reclaim(&self) -> usize {
        let mut retired = self.retired.lock();
        Self::sweep(&mut retired, &self.reclaimed)
    }

    fn sweep(retired: &mut Vec<Arc<T>>, reclaimed: &AtomicU64) -> usize {
        let before = retired.len();
        retired.retain(|cfg| !is_reclaimable(cfg));
        let freed = before - retired.len();
        reclaimed.fetch_add(freed as u64, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        if freed > 0 {
            tracing::trace!(freed, pending = retired.len(), "config_slot: reclaim");
        }
        freed
    }

    /// Number of completed publishes.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    /// Number of retired configurations freed so far.
    pub fn reclaimed(&self) -> u64 {
        self.reclaimed.load(Ordering::Relaxed)
    }

    /// Retired configurations still referenced by a reader.
    pub fn pending(&self) -> usize {
        self.retired.lock().len()
    }
}

impl<T> Default for ConfigSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ConfigSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSlot")
            .field("published", &self.published())
            .field("reclaimed", &self.reclaimed())
            .field("pending", &self.pending())
            .finish()
    }
}
