//! Per-residue side-chain torsion definitions.
//!
//! The table is data, loaded from JSON:
//! ```json
//! {
//!   "GLY": [],
//!   "SER": [{ "name": "chi1", "atoms": ["N", "CA", "CB", "OG"], "offset": 3.141592653589793 }],
//!   "VAL": [{ "name": "chi1", "atoms": ["N", "CA", "CB", "CG1"],
//!             "alt_atoms": ["N", "CA", "CB", "CG2"], "offset": 3.141592653589793 }]
//! }
//! ```
//!
//! A torsion with `alt_atoms` is the mean of both dihedrals. `offset` (radians,
//! default 0) is added afterwards and the sum is not wrapped.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use warp_rmsd::dihedral;

use crate::error::{TorsionError, TorsionResult};
use crate::residue::Residue;

/// At most this many chi angles per residue.
pub const MAX_CHI: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorsionDef {
    pub name: String,
    pub atoms: [String; 4],
    #[serde(default)]
    pub alt_atoms: Option<[String; 4]>,
    #[serde(default)]
    pub offset: f64,
}

impl TorsionDef {
    pub fn new(name: &str, atoms: [&str; 4]) -> Self {
        Self {
            name: name.to_string(),
            atoms: atoms.map(str::to_string),
            alt_atoms: None,
            offset: 0.0,
        }
    }

    pub fn with_alt(mut self, atoms: [&str; 4]) -> Self {
        self.alt_atoms = Some(atoms.map(str::to_string));
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn measure(&self, residue: &Residue) -> TorsionResult<f64> {
        let primary = measure_tuple(residue, &self.atoms)?;
        let value = match &self.alt_atoms {
            Some(alt) => 0.5 * (primary + measure_tuple(residue, alt)?),
            None => primary,
        };
        Ok(value + self.offset)
    }
}

fn measure_tuple(residue: &Residue, atoms: &[String; 4]) -> TorsionResult<f64> {
    Ok(dihedral(
        residue.require(&atoms[0])?,
        residue.require(&atoms[1])?,
        residue.require(&atoms[2])?,
        residue.require(&atoms[3])?,
    ))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RotamerTable {
    residues: BTreeMap<String, Vec<TorsionDef>>,
}

impl RotamerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> TorsionResult<Self> {
        let table: RotamerTable =
            serde_json::from_str(text).map_err(|e| TorsionError::Table(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_path(path: &Path) -> TorsionResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Adds or replaces the torsions of one residue type.
    pub fn insert(&mut self, res_name: &str, torsions: Vec<TorsionDef>) -> TorsionResult<()> {
        check_entry(res_name, &torsions)?;
        self.residues.insert(res_name.to_string(), torsions);
        Ok(())
    }

    pub fn get(&self, res_name: &str) -> Option<&[TorsionDef]> {
        self.residues.get(res_name).map(Vec::as_slice)
    }

    pub fn contains(&self, res_name: &str) -> bool {
        self.residues.contains_key(res_name)
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    fn validate(&self) -> TorsionResult<()> {
        for (name, torsions) in &self.residues {
            check_entry(name, torsions)?;
        }
        Ok(())
    }
}

fn check_entry(res_name: &str, torsions: &[TorsionDef]) -> TorsionResult<()> {
    if torsions.len() > MAX_CHI {
        return Err(TorsionError::Table(format!(
            "{res_name} defines {} torsions, at most {MAX_CHI} allowed",
            torsions.len()
        )));
    }
    if let Some(bad) = torsions.iter().find(|t| !t.offset.is_finite()) {
        return Err(TorsionError::Table(format!(
            "{res_name} {} has a non-finite offset",
            bad.name
        )));
    }
    Ok(())
}
