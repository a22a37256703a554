#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3, Vector4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the reference three-atom gradient case.
pub const REF_SOURCE: [f64; 9] = [2.0, 0.0, 0.0, 3.0, 0.1, 1.0, 3.0, 0.1, 0.0];
/// Target of the reference three-atom gradient case.
pub const REF_TARGET: [f64; 9] = [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 3.0, 0.0, 0.0];
pub const REF_MSD: f64 = 0.814_43;
pub const REF_RMSD: f64 = 0.902_46;

pub fn temp_path(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let label_path = Path::new(label);
    let stem = label_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(label);
    let filename = match label_path.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!(
            "warp_rmsd_test_{stem}_{}_{}.{}",
            std::process::id(),
            nanos,
            ext
        ),
        None => format!("warp_rmsd_test_{label}_{}_{}", std::process::id(), nanos),
    };
    path.push(filename);
    path
}

pub fn write_text(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write temp file");
}

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Uniformly distributed coordinates in `[-span, span]`.
pub fn random_coords(rng: &mut StdRng, atoms: usize, span: f64) -> Vec<f64> {
    (0..3 * atoms).map(|_| rng.gen_range(-span..span)).collect()
}

pub fn random_rotation(rng: &mut StdRng) -> Matrix3<f64> {
    let q = Vector4::new(
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
    );
    let q = if q.norm() < 1e-3 { Vector4::x() } else { q };
    UnitQuaternion::from_quaternion(Quaternion::from_vector(q))
        .to_rotation_matrix()
        .into_inner()
}

/// `r * p + shift` for every point of a flat array.
pub fn rigid_motion(flat: &[f64], r: &Matrix3<f64>, shift: [f64; 3]) -> Vec<f64> {
    let t = Vector3::from(shift);
    flat.chunks(3)
        .flat_map(|p| {
            let q = r * Vector3::new(p[0], p[1], p[2]) + t;
            [q[0], q[1], q[2]]
        })
        .collect()
}

pub fn assert_close(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "expected {b}, got {a} (tol {tol})");
}
