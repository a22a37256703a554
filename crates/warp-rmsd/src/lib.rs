//! warp-rmsd: differentiable RMSD after optimal rigid superposition.
//!
//! The forward pass aligns each source structure onto its target (Kabsch SVD
//! or Horn quaternion) and returns the mean-square deviation; the backward
//! pass returns the gradient with respect to the source coordinates, reusing
//! the alignment cached in an [`AlignmentState`].

pub mod backward;
pub mod batch_spec;
pub mod config;
pub mod error;
pub mod geom;
pub mod gradcheck;
pub mod padding;
pub mod rmsd;
pub mod state;
pub mod streaming;
pub mod superpose;
pub mod tensor;

pub use backward::{GradSpace, GradientBuffer};
pub use config::RmsdConfig;
pub use error::{RmsdError, RmsdResult};
pub use geom::{dihedral, Vec3};
pub use gradcheck::{gradcheck, GradCheckOptions, GradCheckReport};
pub use padding::{pad, unpad, PaddedBatch};
pub use rmsd::{Coords2Rmsd, RmsdForward};
pub use state::AlignmentState;
pub use superpose::{SolverOptions, SuperposeMethod, Superposition};
pub use tensor::CoordTensor;
