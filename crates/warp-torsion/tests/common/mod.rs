#![allow(dead_code)]

use std::path::{Path, PathBuf};

use warp_rmsd::Vec3;
use warp_torsion::AtomRecord;

pub const N_CA: f64 = 1.458;
pub const CA_C: f64 = 1.525;
pub const C_N: f64 = 1.329;
pub const CA_CB: f64 = 1.53;

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn deg(v: f64) -> f64 {
    v.to_radians()
}

/// Places `d` so that `|cd| = bond`, angle `bcd = angle` and the torsion
/// `abcd = torsion` (radians).
pub fn place(a: Vec3, b: Vec3, c: Vec3, bond: f64, angle: f64, torsion: f64) -> Vec3 {
    let bc = c.sub(b).normalized();
    let n = b.sub(a).cross(bc).normalized();
    let m = n.cross(bc);
    let along = -bond * angle.cos();
    let up = bond * angle.sin() * torsion.cos();
    let out = bond * angle.sin() * torsion.sin();
    c.add(bc.scale(along)).add(m.scale(up)).add(n.scale(out))
}

/// Backbone residue plus optional side-chain atoms placed off its N/CA/CB.
pub struct ResidueSpec {
    pub name: &'static str,
    /// `(atom, the three atoms it hangs off, bond, angle, torsion)`
    pub side_chain: Vec<(&'static str, [&'static str; 3], f64, f64, f64)>,
}

impl ResidueSpec {
    pub fn plain(name: &'static str) -> Self {
        Self {
            name,
            side_chain: Vec::new(),
        }
    }
}

/// Builds one chain with the given per-junction backbone torsions
/// (`phi[i]`, `psi[i]`, `omega[i]` for `i` in `0..len-1`).
pub fn build_chain(
    chain: &str,
    residues: &[ResidueSpec],
    phi: &[f64],
    psi: &[f64],
    omega: &[f64],
) -> Vec<AtomRecord> {
    let mut records = Vec::new();
    let mut n = Vec3::new(0.0, 0.0, 0.0);
    let mut ca = Vec3::new(N_CA, 0.0, 0.0);
    let mut c = place(
        Vec3::new(0.0, 1.0, 0.0),
        n,
        ca,
        CA_C,
        deg(111.2),
        deg(-60.0),
    );
    for (i, spec) in residues.iter().enumerate() {
        if i > 0 {
            let n_next = place(n, ca, c, C_N, deg(116.2), psi[i - 1]);
            let ca_next = place(ca, c, n_next, N_CA, deg(121.7), omega[i - 1]);
            let c_next = place(c, n_next, ca_next, CA_C, deg(111.2), phi[i - 1]);
            n = n_next;
            ca = ca_next;
            c = c_next;
        }
        let num = i as i32 + 1;
        let mut placed: Vec<(&str, Vec3)> = vec![("N", n), ("CA", ca), ("C", c)];
        if !spec.side_chain.is_empty() {
            let cb = place(c, n, ca, CA_CB, deg(110.5), deg(-122.5));
            placed.push(("CB", cb));
        }
        for (atom, parents, bond, angle, torsion) in &spec.side_chain {
            let lookup = |name: &str| {
                placed
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, p)| *p)
                    .expect("parent atom placed")
            };
            let p = place(
                lookup(parents[0]),
                lookup(parents[1]),
                lookup(parents[2]),
                *bond,
                *angle,
                *torsion,
            );
            placed.push((atom, p));
        }
        for (atom, p) in placed {
            records.push(AtomRecord::new(chain, spec.name, num, atom, p));
        }
    }
    records
}

pub fn angle_diff(a: f64, b: f64) -> f64 {
    warp_rmsd::geom::wrap_angle(a - b).abs()
}
