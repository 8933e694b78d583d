//! Active snapshot pointer and the set of retired handles.
//!
//! Readers never lock: the active handle lives behind an [`ArcSwap`] and
//! in-flight accounting is a per-handle atomic counter. Retired handles
//! stay in a concurrent map until their last pin is released and
//! [`SnapshotRegistry::cleanup_retired`] sweeps them.

use super::handle::{SnapshotHandle, SnapshotPin, SnapshotState};
use super::{Snapshot, SnapshotVersion};
use crate::behavior::Behavior;
use crate::metrics;
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub struct SnapshotRegistry {
    active: ArcSwap<SnapshotHandle>,
    retired: DashMap<SnapshotVersion, Arc<SnapshotHandle>>,
}

impl SnapshotRegistry {
    /// Registry whose first active snapshot is `initial`.
    pub fn new(initial: Arc<Snapshot>, fallback: Behavior) -> Self {
        let handle = SnapshotHandle::new(initial, fallback);
        handle.advance(SnapshotState::Active);
        info!(version = %handle.version(), "Activated initial snapshot");
        Self {
            active: ArcSwap::from_pointee(handle),
            retired: DashMap::new(),
        }
    }

    /// The current active handle, without pinning it.
    pub fn active(&self) -> Arc<SnapshotHandle> {
        self.active.load_full()
    }

    pub fn active_version(&self) -> SnapshotVersion {
        self.active.load().version().clone()
    }

    /// Pin the active handle for the lifetime of one request.
    ///
    /// The counter is incremented before the pointer is re-checked, so a
    /// concurrent swap either sees the pin on the retired handle or the
    /// caller retries against the new one.
    pub fn pin(&self) -> SnapshotPin {
        loop {
            let candidate = self.active.load_full();
            let pin = SnapshotPin::acquire(Arc::clone(&candidate));
            if Arc::ptr_eq(&candidate, &self.active.load()) {
                return pin;
            }
            drop(pin);
        }
    }

    /// Swap in a new snapshot and retire the previous one. Returns the new
    /// handle.
    pub fn activate_new(&self, snapshot: Arc<Snapshot>, fallback: Behavior) -> Arc<SnapshotHandle> {
        let handle = Arc::new(SnapshotHandle::new(snapshot, fallback));
        handle.advance(SnapshotState::Active);

        let previous = self.active.swap(Arc::clone(&handle));
        previous.advance(SnapshotState::Retired);
        info!(
            version = %handle.version(),
            retired = %previous.version(),
            in_flight = previous.in_flight(),
            "Activated snapshot"
        );
        self.retired.insert(previous.version().clone(), previous);
        metrics::SNAPSHOTS_RETIRED.set(self.retired.len() as f64);
        handle
    }

    /// Drop retired handles that no request still pins. Returns how many
    /// were reclaimed.
    pub fn cleanup_retired(&self) -> usize {
        let before = self.retired.len();
        self.retired.retain(|version, handle| {
            if handle.is_idle() {
                debug!(%version, "Reclaimed retired snapshot");
                handle.release_metrics();
                false
            } else {
                true
            }
        });
        let remaining = self.retired.len();
        metrics::SNAPSHOTS_RETIRED.set(remaining as f64);
        before.saturating_sub(remaining)
    }

    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    pub fn retired_versions(&self) -> Vec<SnapshotVersion> {
        self.retired.iter().map(|e| e.key().clone()).collect()
    }
}
