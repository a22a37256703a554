//! Analytic gradient of the forward pass with respect to the source
//! coordinates.
//!
//! At the optimal superposition the rotation is stationary, so it is held
//! fixed when differentiating:
//!
//! ```text
//! d msd / d x_i = 2 / n * R^T (R x'_i - y'_i) = 2 / n * (x'_i - R^T y'_i)
//! ```
//!
//! The centering term drops out because the residuals of the centered sets
//! sum to zero. Target coordinates receive no gradient.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{RmsdError, RmsdResult};
use crate::rmsd::Coords2Rmsd;
use crate::state::{AlignmentState, EntryState, EntryStatus};
use crate::streaming::{duration_ms, StreamEvent};

/// Which forward quantity the gradient is taken of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradSpace {
    /// `sqrt(msd)`.
    #[default]
    Rmsd,
    /// The mean-square deviation returned by forward.
    Msd,
}

impl GradSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rmsd => "rmsd",
            Self::Msd => "msd",
        }
    }
}

/// Gradient laid out exactly like the forward input, padding included.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientBuffer {
    data: Vec<f64>,
    shape: Vec<usize>,
    capacity: usize,
}

impl GradientBuffer {
    pub fn zeros(shape: Vec<usize>, batch: usize, capacity: usize) -> Self {
        Self {
            data: vec![0.0; batch * 3 * capacity],
            shape,
            capacity,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn batch_size(&self) -> usize {
        if self.capacity == 0 {
            0
        } else {
            self.data.len() / (3 * self.capacity)
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn entry(&self, index: usize) -> &[f64] {
        let stride = 3 * self.capacity;
        &self.data[index * stride..(index + 1) * stride]
    }
}

impl Coords2Rmsd {
    /// Gradient of `sqrt(msd)` per entry, scaled by `grad_output`.
    pub fn backward(
        &self,
        grad_output: &[f64],
        state: &mut AlignmentState,
    ) -> RmsdResult<GradientBuffer> {
        self.backward_in(GradSpace::Rmsd, grad_output, state)
    }

    /// Gradient of the mean-square deviation per entry, scaled by `grad_output`.
    pub fn backward_msd(
        &self,
        grad_output: &[f64],
        state: &mut AlignmentState,
    ) -> RmsdResult<GradientBuffer> {
        self.backward_in(GradSpace::Msd, grad_output, state)
    }

    /// Consumes every entry of `state`. Nothing is consumed when an error is
    /// returned.
    pub fn backward_in(
        &self,
        space: GradSpace,
        grad_output: &[f64],
        state: &mut AlignmentState,
    ) -> RmsdResult<GradientBuffer> {
        let start = Instant::now();
        let result = compute(space, grad_output, state);
        match &result {
            Ok(_) => self.emitter().emit(&StreamEvent::BackwardComplete {
                batch_size: state.batch_size(),
                space: space.as_str().to_string(),
                elapsed_ms: duration_ms(start.elapsed()),
            }),
            Err(err) => self.emitter().emit_error(err.code(), &err.to_string()),
        }
        result
    }
}

fn compute(
    space: GradSpace,
    grad_output: &[f64],
    state: &mut AlignmentState,
) -> RmsdResult<GradientBuffer> {
    let batch = state.batch_size();
    if grad_output.len() != batch {
        return Err(RmsdError::InvalidSize(format!(
            "{} upstream gradients for a batch of {batch}",
            grad_output.len()
        )));
    }
    for (index, entry) in state.entries().iter().enumerate() {
        match entry.status() {
            EntryStatus::Ready => {}
            EntryStatus::Consumed => {
                return Err(RmsdError::StaleState(format!(
                    "entry {index} was already consumed by a backward pass"
                )))
            }
            EntryStatus::Empty => {
                return Err(RmsdError::StaleState(format!(
                    "entry {index} has no forward result"
                )))
            }
        }
        if space == GradSpace::Rmsd && entry.msd == 0.0 {
            return Err(RmsdError::DegenerateGradient(format!(
                "entry {index}: deviation is exactly zero, sqrt is not differentiable"
            )));
        }
    }

    let capacity = state.capacity();
    let shape = if state.is_single() {
        vec![3 * capacity]
    } else {
        vec![batch, 3 * capacity]
    };
    let mut grad = GradientBuffer::zeros(shape, batch, capacity);
    let entries = state.entries();
    let stride = 3 * capacity;

    if stride > 0 {
        let run = |(index, out): (usize, &mut [f64])| {
            entry_gradient(&entries[index], space, grad_output[index], out);
        };
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            grad.data.par_chunks_mut(stride).enumerate().for_each(run);
        }
        #[cfg(not(feature = "parallel"))]
        grad.data.chunks_mut(stride).enumerate().for_each(run);
    }

    if let Some(pos) = grad.data.iter().position(|v| !v.is_finite()) {
        return Err(RmsdError::NaNResult(format!(
            "entry {}: non-finite gradient",
            pos / stride
        )));
    }

    for (index, entry) in state.entries_mut().iter_mut().enumerate() {
        entry.consume(index)?;
    }
    Ok(grad)
}

fn entry_gradient(entry: &EntryState, space: GradSpace, upstream: f64, out: &mut [f64]) {
    let n = entry.count as f64;
    let scale = match space {
        GradSpace::Msd => 2.0 * upstream / n,
        // d sqrt(m) = dm / (2 sqrt(m))
        GradSpace::Rmsd => upstream / (n * entry.msd.sqrt()),
    };
    let valid = 3 * entry.count;
    for ((g, x), ry) in out[..valid]
        .iter_mut()
        .zip(&entry.centered_source[..valid])
        .zip(&entry.back_rotated_target[..valid])
    {
        *g = scale * (x - ry);
    }
}
