//! Vector kernel shared by the superposition solver and the torsion extractor.
//!
//! Everything here is `f64`. Inputs stored as `f32` are promoted at the
//! boundary (see [`crate::tensor`]).

use std::f64::consts::PI;

use nalgebra::Vector3;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_array(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Reads atom `atom` out of a flat triple-stride buffer.
    pub fn from_flat(flat: &[f64], atom: usize) -> Self {
        let base = 3 * atom;
        Self::new(flat[base], flat[base + 1], flat[base + 2])
    }

    /// Writes `self` into slot `atom` of a flat triple-stride buffer.
    pub fn write_flat(self, flat: &mut [f64], atom: usize) {
        let base = 3 * atom;
        flat[base] = self.x;
        flat[base + 1] = self.y;
        flat[base + 2] = self.z;
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn norm_squared(self) -> f64 {
        self.dot(self)
    }

    /// Unit vector along `self`, or zero when the length underflows.
    pub fn normalized(self) -> Self {
        let n = self.norm();
        if n < 1e-15 {
            return Self::zero();
        }
        self.scale(1.0 / n)
    }

    pub fn scale(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl From<Vector3<f64>> for Vec3 {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for Vector3<f64> {
    fn from(v: Vec3) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

/// Mean of the first `count` points of a flat triple-stride buffer.
pub fn centroid(flat: &[f64], count: usize) -> Vec3 {
    if count == 0 {
        return Vec3::zero();
    }
    let mut sum = Vec3::zero();
    for atom in 0..count {
        sum = sum.add(Vec3::from_flat(flat, atom));
    }
    sum.scale(1.0 / count as f64)
}

/// Torsion angle of four sequential points in radians, range (-π, π].
///
/// Positive when the `p1` bond must rotate clockwise to eclipse the `p4` bond
/// looking down `p2 -> p3`. Returns 0 when the central bond has zero length.
pub fn dihedral(p1: Vec3, p2: Vec3, p3: Vec3, p4: Vec3) -> f64 {
    let b0 = p1.sub(p2);
    let b1 = p3.sub(p2);
    let b2 = p4.sub(p3);
    let b1_len = b1.norm();
    if b1_len == 0.0 {
        return 0.0;
    }
    let b1n = b1.scale(1.0 / b1_len);
    let v = b0.sub(b1n.scale(b0.dot(b1n)));
    let w = b2.sub(b1n.scale(b2.dot(b1n)));
    let x = v.dot(w);
    let y = b1n.cross(v).dot(w);
    let angle = y.atan2(x);
    if angle <= -PI {
        PI
    } else {
        angle
    }
}

/// Wraps an angle into (-π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    let tau = 2.0 * PI;
    let wrapped = (angle + PI).rem_euclid(tau) - PI;
    if wrapped <= -PI {
        wrapped + tau
    } else {
        wrapped
    }
}
