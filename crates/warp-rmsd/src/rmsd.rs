//! Forward evaluator: per-entry superposition and mean-square deviation.

use std::time::Instant;

use nalgebra::Vector3;

use crate::config::RmsdConfig;
use crate::error::{RmsdError, RmsdResult};
use crate::geom::Vec3;
use crate::state::{AlignmentState, EntryState};
use crate::streaming::{duration_ms, StreamEmitter, StreamEvent};
use crate::superpose::{solve_into, SolverOptions};
use crate::tensor::{CoordTensor, Layout};

/// Mean-square deviations together with the state backward needs.
#[derive(Debug, Clone)]
pub struct RmsdForward {
    pub msd: Vec<f64>,
    pub state: AlignmentState,
}

impl RmsdForward {
    pub fn rmsd(&self) -> Vec<f64> {
        self.msd.iter().map(|v| v.sqrt()).collect()
    }

    pub fn into_state(self) -> AlignmentState {
        self.state
    }
}

/// Batched RMSD layer: aligns each source onto its target and reports the
/// squared deviation after optimal superposition.
#[derive(Debug, Clone, Default)]
pub struct Coords2Rmsd {
    options: SolverOptions,
    capacity: Option<usize>,
    emitter: StreamEmitter,
}

impl Coords2Rmsd {
    pub fn new(options: SolverOptions) -> Self {
        Self {
            options,
            capacity: None,
            emitter: StreamEmitter::disabled(),
        }
    }

    pub fn from_config(config: &RmsdConfig) -> RmsdResult<Self> {
        let config = config.normalized()?;
        Ok(Self {
            options: config.solver_options(),
            capacity: config.capacity,
            emitter: StreamEmitter::new(config.stream),
        })
    }

    /// Requires every input to use exactly `capacity` atom slots.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_emitter(mut self, emitter: StreamEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn emitter(&self) -> StreamEmitter {
        self.emitter
    }

    /// Allocates a state sized for `input`.
    pub fn state_for(&self, input: &CoordTensor<'_>) -> AlignmentState {
        AlignmentState::new(input.batch_size(), input.capacity())
    }

    /// Runs the forward pass into a freshly allocated state.
    pub fn forward(
        &self,
        input: &CoordTensor<'_>,
        target: &CoordTensor<'_>,
        num_atoms: &[usize],
    ) -> RmsdResult<RmsdForward> {
        let mut state = self.state_for(input);
        let msd = self.forward_into(input, target, num_atoms, &mut state)?;
        Ok(RmsdForward { msd, state })
    }

    /// Runs the forward pass, reusing `state`'s buffers when the shape allows.
    ///
    /// On failure every entry of `state` is left empty.
    pub fn forward_into(
        &self,
        input: &CoordTensor<'_>,
        target: &CoordTensor<'_>,
        num_atoms: &[usize],
        state: &mut AlignmentState,
    ) -> RmsdResult<Vec<f64>> {
        let result = self.run_forward(input, target, num_atoms, state);
        if let Err(err) = &result {
            state.reset();
            self.emitter.emit_error(err.code(), &err.to_string());
        }
        result
    }

    fn run_forward(
        &self,
        input: &CoordTensor<'_>,
        target: &CoordTensor<'_>,
        num_atoms: &[usize],
        state: &mut AlignmentState,
    ) -> RmsdResult<Vec<f64>> {
        self.validate(input, target, num_atoms)?;
        let start = Instant::now();
        let batch = input.batch_size();
        let capacity = input.capacity();
        self.emitter.emit(&StreamEvent::ForwardStarted {
            batch_size: batch,
            capacity,
            method: self.options.method.as_str().to_string(),
        });

        state.ensure_shape(batch, capacity);
        state.set_single(input.layout() == Layout::Single);

        let options = &self.options;
        let run = |(index, entry): (usize, &mut EntryState)| -> RmsdResult<f64> {
            fill_entry(entry, input.entry(index), target.entry(index), num_atoms[index], options)
                .map_err(|err| err.in_entry(index))
        };

        #[cfg(feature = "parallel")]
        let results: Vec<RmsdResult<f64>> = {
            use rayon::prelude::*;
            state.entries_mut().par_iter_mut().enumerate().map(run).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let results: Vec<RmsdResult<f64>> =
            state.entries_mut().iter_mut().enumerate().map(run).collect();

        let msd = results.into_iter().collect::<RmsdResult<Vec<f64>>>()?;

        let (min_msd, max_msd) = msd
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        self.emitter.emit(&StreamEvent::ForwardComplete {
            batch_size: batch,
            min_msd,
            max_msd,
            elapsed_ms: duration_ms(start.elapsed()),
        });
        Ok(msd)
    }

    fn validate(
        &self,
        input: &CoordTensor<'_>,
        target: &CoordTensor<'_>,
        num_atoms: &[usize],
    ) -> RmsdResult<()> {
        if !input.same_shape(target) {
            return Err(RmsdError::InvalidSize(format!(
                "input shape {:?} differs from target shape {:?}",
                input.shape(),
                target.shape()
            )));
        }
        if let Some(expected) = self.capacity {
            if input.capacity() != expected {
                return Err(RmsdError::InvalidSize(format!(
                    "inputs hold {} atom slots, layer expects {expected}",
                    input.capacity()
                )));
            }
        }
        if num_atoms.len() != input.batch_size() {
            return Err(RmsdError::InvalidSize(format!(
                "{} atom counts given for a batch of {}",
                num_atoms.len(),
                input.batch_size()
            )));
        }
        if let Some((index, &count)) = num_atoms
            .iter()
            .enumerate()
            .find(|&(_, &c)| c > input.capacity())
        {
            return Err(RmsdError::InvalidSize(format!(
                "entry {index}: {count} atoms exceed capacity {}",
                input.capacity()
            )));
        }
        Ok(())
    }
}

fn fill_entry(
    entry: &mut EntryState,
    source: &[f64],
    target: &[f64],
    count: usize,
    options: &SolverOptions,
) -> RmsdResult<f64> {
    entry.clear();
    let sup = solve_into(
        source,
        target,
        count,
        options,
        &mut entry.centered_source,
        &mut entry.centered_target,
    )?;

    let r = sup.rotation;
    let r_t = r.transpose();
    for atom in 0..count {
        let xr: Vector3<f64> = Vec3::from_flat(&entry.centered_source, atom).into();
        let yr: Vector3<f64> = Vec3::from_flat(&entry.centered_target, atom).into();
        Vec3::from(r * xr).write_flat(&mut entry.rotated_source, atom);
        Vec3::from(r_t * yr).write_flat(&mut entry.back_rotated_target, atom);
    }

    let msd = sup.residual / count as f64;
    if !msd.is_finite() {
        return Err(RmsdError::NaNResult(format!("mean-square deviation is {msd}")));
    }
    entry.count = count;
    entry.msd = msd;
    entry.rotation = r;
    entry.source_centroid = sup.source_centroid;
    entry.target_centroid = sup.target_centroid;
    entry.mark_ready();
    Ok(msd)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn pair() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
        (1usize..8).prop_flat_map(|atoms| {
            (
                proptest::collection::vec(-10.0f64..10.0, 3 * atoms),
                proptest::collection::vec(-10.0f64..10.0, 3 * atoms),
            )
        })
    }

    fn msd_of(source: &[f64], target: &[f64]) -> f64 {
        Coords2Rmsd::default()
            .forward(
                &CoordTensor::single(source).unwrap(),
                &CoordTensor::single(target).unwrap(),
                &[source.len() / 3],
            )
            .unwrap()
            .msd[0]
    }

    proptest! {
        #[test]
        fn msd_is_finite_and_non_negative((source, target) in pair()) {
            let msd = msd_of(&source, &target);
            prop_assert!(msd.is_finite());
            prop_assert!(msd >= 0.0);
        }

        #[test]
        fn translation_leaves_msd_unchanged(
            (source, target) in pair(),
            shift in proptest::array::uniform3(-50.0f64..50.0),
        ) {
            let moved: Vec<f64> = target
                .iter()
                .enumerate()
                .map(|(k, v)| v + shift[k % 3])
                .collect();
            let a = msd_of(&source, &target);
            let b = msd_of(&source, &moved);
            prop_assert!((a - b).abs() <= 1e-8 * a.max(1.0));
        }

        #[test]
        fn alignment_never_worse_than_centering_alone((source, target) in pair()) {
            let n = source.len() / 3;
            let cx = crate::geom::centroid(&source, n);
            let cy = crate::geom::centroid(&target, n);
            let unrotated: f64 = (0..n)
                .map(|atom| {
                    Vec3::from_flat(&source, atom)
                        .sub(cx)
                        .sub(Vec3::from_flat(&target, atom).sub(cy))
                        .norm_squared()
                })
                .sum::<f64>()
                / n as f64;
            prop_assert!(msd_of(&source, &target) <= unrotated + 1e-9 * unrotated.max(1.0));
        }
    }
}
