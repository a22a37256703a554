//! warp-torsion: Cartesian coordinates to backbone and side-chain torsions.
//!
//! Atoms are grouped into residues and chains, backbone phi/psi/omega are
//! measured along each chain, and side-chain chi angles are read off a
//! [`RotamerTable`] loaded from JSON. Every residue yields eight angles in
//! radians: phi, psi, omega, chi1..chi5.

pub mod angles;
pub mod error;
pub mod residue;
pub mod rotamer;

pub use angles::{AngleBatch, Coords2Angles, ANGLES_PER_RESIDUE};
pub use error::{TorsionError, TorsionResult};
pub use residue::{group_residues, AtomRecord, Chain, Residue};
pub use rotamer::{RotamerTable, TorsionDef};
