//! Reference-counted holder for one snapshot.

use super::{Snapshot, SnapshotVersion};
use crate::behavior::Behavior;
use crate::metrics;
use prometheus::Gauge;
use serde::Serialize;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

/// Lifecycle of a handle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum SnapshotState {
    Created = 0,
    Active = 1,
    Retired = 2,
}

impl SnapshotState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SnapshotState::Created,
            1 => SnapshotState::Active,
            _ => SnapshotState::Retired,
        }
    }
}

#[derive(Debug)]
pub struct SnapshotHandle {
    snapshot: Arc<Snapshot>,
    fallback: Behavior,
    state: AtomicU8,
    in_flight: AtomicUsize,
    in_flight_gauge: Gauge,
}

impl SnapshotHandle {
    pub fn new(snapshot: Arc<Snapshot>, fallback: Behavior) -> Self {
        let in_flight_gauge = metrics::SNAPSHOT_IN_FLIGHT.with_label_values(&[snapshot.version().as_str()]);
        Self {
            snapshot,
            fallback,
            state: AtomicU8::new(SnapshotState::Created as u8),
            in_flight: AtomicUsize::new(0),
            in_flight_gauge,
        }
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn version(&self) -> &SnapshotVersion {
        self.snapshot.version()
    }

    pub fn fallback(&self) -> &Behavior {
        &self.fallback
    }

    pub fn state(&self) -> SnapshotState {
        SnapshotState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Advance the state; a transition backwards is ignored.
    pub(crate) fn advance(&self, to: SnapshotState) -> SnapshotState {
        SnapshotState::from_u8(self.state.fetch_max(to as u8, Ordering::AcqRel))
    }

    fn enter(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.in_flight_gauge.inc();
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.in_flight_gauge.dec();
    }

    pub(crate) fn release_metrics(&self) {
        let _ = metrics::SNAPSHOT_IN_FLIGHT.remove_label_values(&[self.version().as_str()]);
    }
}

/// A request's claim on a handle. Dropping the pin releases it.
#[derive(Debug)]
pub struct SnapshotPin {
    handle: Arc<SnapshotHandle>,
}

impl SnapshotPin {
    pub(crate) fn acquire(handle: Arc<SnapshotHandle>) -> Self {
        handle.enter();
        Self { handle }
    }

    pub fn handle(&self) -> &Arc<SnapshotHandle> {
        &self.handle
    }
}

impl Deref for SnapshotPin {
    type Target = SnapshotHandle;

    fn deref(&self) -> &SnapshotHandle {
        &self.handle
    }
}

impl Drop for SnapshotPin {
    fn drop(&mut self) {
        self.handle.exit();
    }
}
