//! Central finite-difference check of the analytic gradient.

use serde::Serialize;

use crate::backward::GradSpace;
use crate::config::RmsdConfig;
use crate::error::{RmsdError, RmsdResult};
use crate::rmsd::Coords2Rmsd;
use crate::streaming::StreamEvent;
use crate::tensor::CoordTensor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradCheckOptions {
    pub step: f64,
    pub tolerance: f64,
    pub space: GradSpace,
}

impl Default for GradCheckOptions {
    fn default() -> Self {
        Self {
            step: 1.0e-3,
            tolerance: 1.0e-5,
            space: GradSpace::Rmsd,
        }
    }
}

impl GradCheckOptions {
    pub fn from_config(config: &RmsdConfig, space: GradSpace) -> Self {
        Self {
            step: config.gradcheck_step,
            tolerance: config.gradcheck_tolerance,
            space,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GradCheckRow {
    pub entry: usize,
    pub atom: usize,
    pub axis: usize,
    pub analytic: f64,
    pub numeric: f64,
    pub rel_error: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradCheckReport {
    pub space: GradSpace,
    pub step: f64,
    pub tolerance: f64,
    pub rows: Vec<GradCheckRow>,
    pub max_rel_error: f64,
    pub passed: bool,
}

/// Below this magnitude a numeric derivative counts as zero and the error is
/// taken as absolute.
pub const NUMERIC_ZERO: f64 = 1.0e-12;

/// `|a - n| / |n|`, or `|a - n|` when `n` is within [`NUMERIC_ZERO`] of zero.
pub fn relative_error(analytic: f64, numeric: f64) -> f64 {
    let diff = (analytic - numeric).abs();
    if numeric.abs() <= NUMERIC_ZERO {
        diff
    } else {
        diff / numeric.abs()
    }
}

/// Compares `layer`'s backward pass against central differences of its
/// forward pass, for every valid coordinate of every entry.
pub fn gradcheck(
    layer: &Coords2Rmsd,
    input: &CoordTensor<'_>,
    target: &CoordTensor<'_>,
    num_atoms: &[usize],
    options: &GradCheckOptions,
) -> RmsdResult<GradCheckReport> {
    if !(options.step.is_finite() && options.step > 0.0) {
        return Err(RmsdError::Config(format!(
            "finite-difference step must be positive, got {}",
            options.step
        )));
    }
    if !(options.tolerance.is_finite() && options.tolerance > 0.0) {
        return Err(RmsdError::Config(format!(
            "gradcheck tolerance must be positive, got {}",
            options.tolerance
        )));
    }

    let forward = layer.forward(input, target, num_atoms)?;
    let mut state = forward.into_state();
    let upstream = vec![1.0; input.batch_size()];
    let analytic = layer.backward_in(options.space, &upstream, &mut state)?;

    // perturbed forwards run on a quiet copy so the stream only carries the summary
    let quiet = layer.clone().with_emitter(Default::default());
    let mut rows = Vec::new();
    for (entry, &count) in num_atoms.iter().enumerate() {
        let mut coords = input.entry(entry).to_vec();
        let reference = target.entry(entry);
        for k in 0..3 * count {
            let original = coords[k];
            coords[k] = original + options.step;
            let plus = entry_value(&quiet, &coords, reference, count, options.space)?;
            coords[k] = original - options.step;
            let minus = entry_value(&quiet, &coords, reference, count, options.space)?;
            coords[k] = original;

            let numeric = (plus - minus) / (2.0 * options.step);
            let a = analytic.entry(entry)[k];
            rows.push(GradCheckRow {
                entry,
                atom: k / 3,
                axis: k % 3,
                analytic: a,
                numeric,
                rel_error: relative_error(a, numeric),
            });
        }
    }

    let max_rel_error = rows.iter().map(|r| r.rel_error).fold(0.0, f64::max);
    let passed = max_rel_error <= options.tolerance;
    if !passed {
        log::warn!(
            "gradcheck: max relative error {max_rel_error:.3e} above tolerance {:.1e}",
            options.tolerance
        );
    }
    layer.emitter().emit(&StreamEvent::GradcheckComplete {
        coordinates: rows.len(),
        max_rel_error,
        tolerance: options.tolerance,
        passed,
    });
    Ok(GradCheckReport {
        space: options.space,
        step: options.step,
        tolerance: options.tolerance,
        rows,
        max_rel_error,
        passed,
    })
}

fn entry_value(
    layer: &Coords2Rmsd,
    coords: &[f64],
    target: &[f64],
    count: usize,
    space: GradSpace,
) -> RmsdResult<f64> {
    let out = layer.forward(
        &CoordTensor::single(coords)?,
        &CoordTensor::single(target)?,
        &[count],
    )?;
    let msd = out.msd[0];
    Ok(match space {
        GradSpace::Msd => msd,
        GradSpace::Rmsd => msd.sqrt(),
    })
}
