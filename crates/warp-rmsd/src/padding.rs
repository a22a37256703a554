//! Ragged <-> fixed-capacity layout transforms.

use crate::error::{RmsdError, RmsdResult};
use crate::tensor::CoordTensor;

/// A batch of structures laid out in one zero-padded buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    /// `[batch, 3 * capacity]`, row-major.
    pub data: Vec<f64>,
    /// Valid atoms per entry.
    pub counts: Vec<usize>,
    /// Atom slots per entry.
    pub capacity: usize,
}

impl PaddedBatch {
    /// An all-zero batch with every count set to zero.
    pub fn zeros(batch: usize, capacity: usize) -> Self {
        Self {
            data: vec![0.0; batch * 3 * capacity],
            counts: vec![0; batch],
            capacity,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.counts.len()
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.batch_size(), 3 * self.capacity]
    }

    pub fn entry(&self, index: usize) -> &[f64] {
        let stride = 3 * self.capacity;
        &self.data[index * stride..(index + 1) * stride]
    }

    /// Borrow as a batched tensor for the forward pass.
    pub fn as_tensor(&self) -> RmsdResult<CoordTensor<'_>> {
        CoordTensor::new(&self.data, &self.shape())
    }

    /// Appends the entries of `other`. Capacities must match.
    pub fn concat(&self, other: &PaddedBatch) -> RmsdResult<PaddedBatch> {
        if self.capacity != other.capacity {
            return Err(RmsdError::InvalidSize(format!(
                "cannot concatenate capacity {} with capacity {}",
                self.capacity, other.capacity
            )));
        }
        let mut data = Vec::with_capacity(self.data.len() + other.data.len());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&other.data);
        let mut counts = Vec::with_capacity(self.counts.len() + other.counts.len());
        counts.extend_from_slice(&self.counts);
        counts.extend_from_slice(&other.counts);
        Ok(PaddedBatch {
            data,
            counts,
            capacity: self.capacity,
        })
    }

    /// Splits into `[0, mid)` and `[mid, batch)`.
    pub fn split_at(&self, mid: usize) -> RmsdResult<(PaddedBatch, PaddedBatch)> {
        if mid > self.batch_size() {
            return Err(RmsdError::InvalidSize(format!(
                "split index {mid} beyond batch size {}",
                self.batch_size()
            )));
        }
        let cut = mid * 3 * self.capacity;
        let left = PaddedBatch {
            data: self.data[..cut].to_vec(),
            counts: self.counts[..mid].to_vec(),
            capacity: self.capacity,
        };
        let right = PaddedBatch {
            data: self.data[cut..].to_vec(),
            counts: self.counts[mid..].to_vec(),
            capacity: self.capacity,
        };
        Ok((left, right))
    }
}

/// Packs ragged flat entries (each `3 * count` long) into zero-padded rows.
pub fn pad<E: AsRef<[f64]>>(entries: &[E], capacity: usize) -> RmsdResult<PaddedBatch> {
    let stride = 3 * capacity;
    let mut out = PaddedBatch::zeros(entries.len(), capacity);
    for (index, entry) in entries.iter().enumerate() {
        let values = entry.as_ref();
        if values.len() % 3 != 0 {
            return Err(RmsdError::InvalidSize(format!(
                "entry {index} has {} values, not a multiple of 3",
                values.len()
            )));
        }
        if values.len() > stride {
            return Err(RmsdError::InvalidSize(format!(
                "entry {index} has {} atoms, capacity is {capacity}",
                values.len() / 3
            )));
        }
        let start = index * stride;
        out.data[start..start + values.len()].copy_from_slice(values);
        out.counts[index] = values.len() / 3;
    }
    Ok(out)
}

/// Extracts the valid region of every row.
pub fn unpad(batch: &PaddedBatch) -> RmsdResult<Vec<Vec<f64>>> {
    unpad_with(&batch.data, &batch.counts, batch.capacity)
}

/// Extracts the valid region of every row of a raw `[batch, 3 * capacity]` buffer.
pub fn unpad_with(data: &[f64], counts: &[usize], capacity: usize) -> RmsdResult<Vec<Vec<f64>>> {
    let stride = 3 * capacity;
    if data.len() != counts.len() * stride {
        return Err(RmsdError::InvalidSize(format!(
            "buffer of {} values does not hold {} rows of capacity {capacity}",
            data.len(),
            counts.len()
        )));
    }
    let mut out = Vec::with_capacity(counts.len());
    for (index, &count) in counts.iter().enumerate() {
        if count > capacity {
            return Err(RmsdError::InvalidSize(format!(
                "entry {index} count {count} exceeds capacity {capacity}"
            )));
        }
        let start = index * stride;
        out.push(data[start..start + 3 * count].to_vec());
    }
    Ok(out)
}
