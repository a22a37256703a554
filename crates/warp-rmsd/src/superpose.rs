//! Optimal rigid superposition of two matched point sets.
//!
//! Both methods find the proper rotation `R` minimising
//! `sum_i |R (x_i - cx) - (y_i - cy)|^2` over the first `count` atoms.
//! [`SuperposeMethod::Svd`] is the Kabsch construction with the usual
//! determinant correction; [`SuperposeMethod::Quaternion`] takes the dominant
//! eigenvector of Horn's 4x4 key matrix. Both run in `f64`.

use nalgebra::linalg::SymmetricEigen;
use nalgebra::{Matrix3, Matrix4, Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{RmsdError, RmsdResult};
use crate::geom::{centroid, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuperposeMethod {
    #[default]
    Svd,
    Quaternion,
}

impl SuperposeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Svd => "svd",
            Self::Quaternion => "quaternion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    pub method: SuperposeMethod,
    /// Iteration cap for the SVD / eigen sweeps.
    pub max_iterations: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: SuperposeMethod::Svd,
            max_iterations: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Superposition {
    /// Proper rotation taking centered source onto centered target.
    pub rotation: Matrix3<f64>,
    /// Minimal sum of squared distances after alignment.
    pub residual: f64,
    pub source_centroid: Vec3,
    pub target_centroid: Vec3,
    /// Whether the unconstrained optimum was a reflection and got corrected.
    pub reflection_corrected: bool,
}

/// Solver output together with the centered copies of both inputs.
#[derive(Debug, Clone)]
pub struct Aligned {
    pub superposition: Superposition,
    pub centered_source: Vec<f64>,
    pub centered_target: Vec<f64>,
}

/// Residuals at or below this many ulps of the total squared spread of the
/// centered sets are reported as exactly zero.
pub const ZERO_RESIDUAL_ULPS: f64 = 8.0;

/// Allocating form of [`solve_into`].
pub fn solve(
    source: &[f64],
    target: &[f64],
    count: usize,
    options: &SolverOptions,
) -> RmsdResult<Aligned> {
    let mut centered_source = vec![0.0; 3 * count];
    let mut centered_target = vec![0.0; 3 * count];
    let superposition = solve_into(
        source,
        target,
        count,
        options,
        &mut centered_source,
        &mut centered_target,
    )?;
    Ok(Aligned {
        superposition,
        centered_source,
        centered_target,
    })
}

/// Superposes the first `count` atoms of `source` onto `target`.
///
/// The centered coordinates are written to the first `3 * count` values of
/// the two output buffers; anything past that is left untouched.
pub fn solve_into(
    source: &[f64],
    target: &[f64],
    count: usize,
    options: &SolverOptions,
    centered_source: &mut [f64],
    centered_target: &mut [f64],
) -> RmsdResult<Superposition> {
    if count == 0 {
        return Err(RmsdError::DegenerateInput(
            "superposition needs at least one atom".into(),
        ));
    }
    let n3 = 3 * count;
    if source.len() < n3 || target.len() < n3 {
        return Err(RmsdError::InvalidSize(format!(
            "{count} atoms requested but inputs hold {} and {} values",
            source.len(),
            target.len()
        )));
    }
    if centered_source.len() < n3 || centered_target.len() < n3 {
        return Err(RmsdError::InvalidSize(format!(
            "centered buffers too small for {count} atoms"
        )));
    }
    if let Some(pos) = source[..n3]
        .iter()
        .chain(target[..n3].iter())
        .position(|v| !v.is_finite())
    {
        return Err(RmsdError::NaNResult(format!(
            "non-finite input coordinate at flat index {}",
            pos % n3
        )));
    }

    let cx = centroid(source, count);
    let cy = centroid(target, count);
    let mut h: Matrix3<f64> = Matrix3::zeros();
    let mut spread = 0.0f64;
    for atom in 0..count {
        let xr = Vec3::from_flat(source, atom).sub(cx);
        let yr = Vec3::from_flat(target, atom).sub(cy);
        xr.write_flat(centered_source, atom);
        yr.write_flat(centered_target, atom);
        spread += xr.norm_squared() + yr.norm_squared();
        h += Vector3::from(xr) * Vector3::from(yr).transpose();
    }

    let (rotation, reflection_corrected) = match options.method {
        SuperposeMethod::Svd => kabsch_rotation(h, options.max_iterations)?,
        SuperposeMethod::Quaternion => (horn_rotation(&h, options.max_iterations)?, false),
    };
    if reflection_corrected {
        log::debug!("superposition: improper optimum corrected on smallest singular axis");
    }

    let mut residual = 0.0f64;
    for atom in 0..count {
        let xr: Vector3<f64> = Vec3::from_flat(centered_source, atom).into();
        let yr: Vector3<f64> = Vec3::from_flat(centered_target, atom).into();
        let diff = rotation * xr - yr;
        residual += diff.dot(&diff);
    }
    if !residual.is_finite() {
        return Err(RmsdError::NaNResult(format!(
            "superposition residual is {residual}"
        )));
    }
    // Sets equal up to rotation leave only rounding noise behind.
    if residual <= ZERO_RESIDUAL_ULPS * f64::EPSILON * spread {
        residual = 0.0;
    }

    Ok(Superposition {
        rotation,
        residual,
        source_centroid: cx,
        target_centroid: cy,
        reflection_corrected,
    })
}

/// Kabsch rotation from the cross-covariance `h = sum x y^T`.
fn kabsch_rotation(h: Matrix3<f64>, max_iterations: usize) -> RmsdResult<(Matrix3<f64>, bool)> {
    let svd = h
        .try_svd(true, true, f64::EPSILON, max_iterations)
        .ok_or_else(|| {
            log::warn!("superposition: SVD did not converge in {max_iterations} iterations");
            RmsdError::Solver("SVD of the cross-covariance did not converge".into())
        })?;
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(RmsdError::Solver("SVD factors were not computed".into())),
    };
    let mut v = v_t.transpose();
    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        // singular values are not assumed sorted
        let smallest = svd.singular_values.imin();
        v.column_mut(smallest).neg_mut();
        r = v * u.transpose();
        return Ok((r, true));
    }
    Ok((r, false))
}

/// Rotation from the dominant eigenvector of Horn's key matrix.
fn horn_rotation(h: &Matrix3<f64>, max_iterations: usize) -> RmsdResult<Matrix3<f64>> {
    let (sxx, sxy, sxz) = (h[(0, 0)], h[(0, 1)], h[(0, 2)]);
    let (syx, syy, syz) = (h[(1, 0)], h[(1, 1)], h[(1, 2)]);
    let (szx, szy, szz) = (h[(2, 0)], h[(2, 1)], h[(2, 2)]);
    #[rustfmt::skip]
    let key = Matrix4::new(
        sxx + syy + szz, syz - szy,        szx - sxz,        sxy - syx,
        syz - szy,       sxx - syy - szz,  sxy + syx,        szx + sxz,
        szx - sxz,       sxy + syx,        -sxx + syy - szz, syz + szy,
        sxy - syx,       szx + sxz,        syz + szy,        -sxx - syy + szz,
    );
    let eig = SymmetricEigen::try_new(key, f64::EPSILON, max_iterations).ok_or_else(|| {
        log::warn!("superposition: key-matrix eigensolve did not converge");
        RmsdError::Solver("eigen-decomposition of the key matrix did not converge".into())
    })?;
    let best = eig.eigenvalues.imax();
    let q = eig.eigenvectors.column(best);
    let quat = Quaternion::new(q[0], q[1], q[2], q[3]);
    if quat.norm() == 0.0 {
        return Err(RmsdError::Solver("key-matrix eigenvector vanished".into()));
    }
    Ok(UnitQuaternion::from_quaternion(quat)
        .to_rotation_matrix()
        .into_inner())
}
