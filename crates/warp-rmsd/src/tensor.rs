//! Shape-checked views over flat coordinate arrays.
//!
//! A coordinate array is either a single structure (`[3 * capacity]`) or a
//! batch of structures (`[batch, 3 * capacity]`). Storage is always `f64`;
//! `f32` input is promoted once on construction.

use std::borrow::Cow;

use crate::error::{RmsdError, RmsdResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Rank-1 input: one structure.
    Single,
    /// Rank-2 input: `batch` structures.
    Batched,
}

#[derive(Debug, Clone)]
pub struct CoordTensor<'a> {
    data: Cow<'a, [f64]>,
    layout: Layout,
    batch: usize,
    capacity: usize,
}

impl<'a> CoordTensor<'a> {
    /// Wraps `data` with the given `shape` (rank 1 or 2).
    pub fn new(data: &'a [f64], shape: &[usize]) -> RmsdResult<Self> {
        let (layout, batch, capacity) = check_shape(data.len(), shape)?;
        Ok(Self {
            data: Cow::Borrowed(data),
            layout,
            batch,
            capacity,
        })
    }

    pub fn single(data: &'a [f64]) -> RmsdResult<Self> {
        Self::new(data, &[data.len()])
    }

    pub fn batched(data: &'a [f64], batch: usize) -> RmsdResult<Self> {
        if batch == 0 {
            return Err(RmsdError::InvalidSize("batch size must be positive".into()));
        }
        Self::new(data, &[batch, data.len() / batch])
    }

    /// Promotes single-precision coordinates to `f64`.
    pub fn from_f32(data: &[f32], shape: &[usize]) -> RmsdResult<CoordTensor<'static>> {
        let (layout, batch, capacity) = check_shape(data.len(), shape)?;
        let promoted: Vec<f64> = data.iter().map(|&v| v as f64).collect();
        Ok(CoordTensor {
            data: Cow::Owned(promoted),
            layout,
            batch,
            capacity,
        })
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn batch_size(&self) -> usize {
        self.batch
    }

    /// Atom slots per entry.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn shape(&self) -> Vec<usize> {
        match self.layout {
            Layout::Single => vec![3 * self.capacity],
            Layout::Batched => vec![self.batch, 3 * self.capacity],
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Flat coordinates of entry `index` (length `3 * capacity`).
    pub fn entry(&self, index: usize) -> &[f64] {
        let stride = 3 * self.capacity;
        &self.data[index * stride..(index + 1) * stride]
    }

    pub fn same_shape(&self, other: &CoordTensor<'_>) -> bool {
        self.layout == other.layout && self.batch == other.batch && self.capacity == other.capacity
    }
}

fn check_shape(len: usize, shape: &[usize]) -> RmsdResult<(Layout, usize, usize)> {
    let (layout, batch, row) = match shape {
        [row] => (Layout::Single, 1, *row),
        [batch, row] => (Layout::Batched, *batch, *row),
        _ => {
            return Err(RmsdError::InvalidSize(format!(
                "expected a flat or batched coordinate array, got rank {}",
                shape.len()
            )))
        }
    };
    if row % 3 != 0 {
        return Err(RmsdError::InvalidSize(format!(
            "row length {row} is not a multiple of 3"
        )));
    }
    if batch.checked_mul(row) != Some(len) {
        return Err(RmsdError::InvalidSize(format!(
            "shape {shape:?} does not match {len} values"
        )));
    }
    Ok((layout, batch, row / 3))
}
