//! Caller-owned alignment cache shared by the forward and backward passes.
//!
//! An [`AlignmentState`] is sized once for `(batch, capacity)` and reused
//! across calls, in the same spirit as a frame builder that reclaims its
//! buffers. Each entry is armed by a forward pass and disarmed by the
//! backward pass that consumes it.

use nalgebra::Matrix3;

use crate::error::{RmsdError, RmsdResult};
use crate::geom::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Never filled, or reset.
    Empty,
    /// Filled by forward, waiting for backward.
    Ready,
    /// Read by backward; must be refilled before the next backward.
    Consumed,
}

/// Cached intermediates for one batch entry.
#[derive(Debug, Clone)]
pub struct EntryState {
    pub count: usize,
    pub msd: f64,
    pub rotation: Matrix3<f64>,
    pub source_centroid: Vec3,
    pub target_centroid: Vec3,
    /// `x - cx`, `3 * capacity` values, padding zero.
    pub centered_source: Vec<f64>,
    /// `y - cy`, `3 * capacity` values, padding zero.
    pub centered_target: Vec<f64>,
    /// `R (x - cx)`.
    pub rotated_source: Vec<f64>,
    /// `R^T (y - cy)`.
    pub back_rotated_target: Vec<f64>,
    status: EntryStatus,
}

impl EntryState {
    pub fn new(capacity: usize) -> Self {
        Self {
            count: 0,
            msd: 0.0,
            rotation: Matrix3::identity(),
            source_centroid: Vec3::zero(),
            target_centroid: Vec3::zero(),
            centered_source: vec![0.0; 3 * capacity],
            centered_target: vec![0.0; 3 * capacity],
            rotated_source: vec![0.0; 3 * capacity],
            back_rotated_target: vec![0.0; 3 * capacity],
            status: EntryStatus::Empty,
        }
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn capacity(&self) -> usize {
        self.centered_source.len() / 3
    }

    /// Zeroes every buffer and drops the cached alignment.
    pub fn clear(&mut self) {
        self.count = 0;
        self.msd = 0.0;
        self.rotation = Matrix3::identity();
        self.source_centroid = Vec3::zero();
        self.target_centroid = Vec3::zero();
        self.centered_source.fill(0.0);
        self.centered_target.fill(0.0);
        self.rotated_source.fill(0.0);
        self.back_rotated_target.fill(0.0);
        self.status = EntryStatus::Empty;
    }

    pub(crate) fn mark_ready(&mut self) {
        self.status = EntryStatus::Ready;
    }

    /// Flips `Ready` to `Consumed`, failing for any other status.
    pub(crate) fn consume(&mut self, index: usize) -> RmsdResult<()> {
        match self.status {
            EntryStatus::Ready => {
                self.status = EntryStatus::Consumed;
                Ok(())
            }
            EntryStatus::Consumed => Err(RmsdError::StaleState(format!(
                "entry {index} was already consumed by a backward pass"
            ))),
            EntryStatus::Empty => Err(RmsdError::StaleState(format!(
                "entry {index} has no forward result"
            ))),
        }
    }
}

/// Per-entry caches for one batch.
#[derive(Debug, Clone)]
pub struct AlignmentState {
    capacity: usize,
    entries: Vec<EntryState>,
    single: bool,
}

impl AlignmentState {
    pub fn new(batch: usize, capacity: usize) -> Self {
        Self {
            capacity,
            entries: (0..batch).map(|_| EntryState::new(capacity)).collect(),
            single: false,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the last forward input was rank 1.
    pub fn is_single(&self) -> bool {
        self.single
    }

    pub(crate) fn set_single(&mut self, single: bool) {
        self.single = single;
    }

    /// Resizes to `(batch, capacity)`, reusing buffers when the shape already matches.
    pub fn ensure_shape(&mut self, batch: usize, capacity: usize) {
        if self.capacity != capacity {
            self.capacity = capacity;
            self.entries.clear();
        }
        if self.entries.len() > batch {
            self.entries.truncate(batch);
        }
        while self.entries.len() < batch {
            self.entries.push(EntryState::new(capacity));
        }
    }

    /// Clears every entry without releasing memory.
    pub fn reset(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.clear();
        }
    }

    pub fn entry(&self, index: usize) -> Option<&EntryState> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[EntryState] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [EntryState] {
        &mut self.entries
    }

    /// Cached mean-square deviations, one per entry.
    pub fn msd(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.msd).collect()
    }

    pub fn is_ready(&self) -> bool {
        !self.entries.is_empty()
            && self
                .entries
                .iter()
                .all(|e| e.status() == EntryStatus::Ready)
    }
}
