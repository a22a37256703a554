//! Backbone and side-chain torsions per residue.

use warp_rmsd::{dihedral, Vec3};

use crate::error::{TorsionError, TorsionResult};
use crate::residue::{group_residues, AtomRecord, Chain, Residue};
use crate::rotamer::RotamerTable;

/// phi, psi, omega, chi1..chi5.
pub const ANGLES_PER_RESIDUE: usize = 8;

const CHI_START: usize = 3;

/// Angles of a batch of structures, `[batch][8][max_len]` row-major,
/// zero past each structure's length.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleBatch {
    pub data: Vec<f64>,
    pub lengths: Vec<usize>,
    pub max_len: usize,
}

impl AngleBatch {
    pub fn batch_size(&self) -> usize {
        self.lengths.len()
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.batch_size(), ANGLES_PER_RESIDUE, self.max_len]
    }

    pub fn get(&self, entry: usize, angle: usize, residue: usize) -> f64 {
        self.data[(entry * ANGLES_PER_RESIDUE + angle) * self.max_len + residue]
    }
}

#[derive(Debug, Clone)]
pub struct Coords2Angles {
    table: RotamerTable,
    strict: bool,
}

impl Coords2Angles {
    pub fn new(table: RotamerTable) -> Self {
        Self {
            table,
            strict: false,
        }
    }

    /// In strict mode a residue missing from the table is an error instead of
    /// getting zero chi angles.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn table(&self) -> &RotamerTable {
        &self.table
    }

    /// Eight angles per residue, in record order.
    pub fn structure_angles(
        &self,
        records: &[AtomRecord],
    ) -> TorsionResult<Vec<[f64; ANGLES_PER_RESIDUE]>> {
        let chains = group_residues(records)?;
        let mut out = Vec::new();
        for chain in &chains {
            out.extend(self.chain_angles(chain)?);
        }
        Ok(out)
    }

    pub fn chain_angles(&self, chain: &Chain) -> TorsionResult<Vec<[f64; ANGLES_PER_RESIDUE]>> {
        let residues = &chain.residues;
        let mut out = Vec::with_capacity(residues.len());
        for (i, res) in residues.iter().enumerate() {
            let mut row = [0.0; ANGLES_PER_RESIDUE];
            let n = res.require("N")?;
            let ca = res.require("CA")?;
            let c = res.require("C")?;
            if i > 0 {
                let c_prev = residues[i - 1].require("C")?;
                row[0] = dihedral(c_prev, n, ca, c);
            }
            if let Some(next) = residues.get(i + 1) {
                let (psi, omega) = forward_backbone(ca, n, c, next)?;
                row[1] = psi;
                row[2] = omega;
            }
            self.side_chain(res, &mut row)?;
            out.push(row);
        }
        Ok(out)
    }

    fn side_chain(&self, res: &Residue, row: &mut [f64; ANGLES_PER_RESIDUE]) -> TorsionResult<()> {
        let Some(torsions) = self.table.get(&res.name) else {
            if self.strict {
                return Err(TorsionError::UnknownResidue(format!(
                    "{} {} is not in the rotamer table",
                    res.name, res.number
                )));
            }
            log::warn!(
                "torsion: residue {} {} not in rotamer table, chi angles left at zero",
                res.name,
                res.number
            );
            return Ok(());
        };
        for (slot, def) in row[CHI_START..].iter_mut().zip(torsions) {
            *slot = def.measure(res)?;
        }
        Ok(())
    }

    /// Angles of every structure, padded to the longest one.
    pub fn batch(&self, structures: &[Vec<AtomRecord>]) -> TorsionResult<AngleBatch> {
        if structures.is_empty() {
            return Err(TorsionError::Empty("batch has no structures".into()));
        }
        let per_structure = structures
            .iter()
            .enumerate()
            .map(|(index, records)| {
                self.structure_angles(records).map_err(|e| match e {
                    TorsionError::Empty(m) => TorsionError::Empty(format!("structure {index}: {m}")),
                    other => other,
                })
            })
            .collect::<TorsionResult<Vec<_>>>()?;

        let lengths: Vec<usize> = per_structure.iter().map(Vec::len).collect();
        let max_len = lengths.iter().copied().max().unwrap_or(0);
        let mut data = vec![0.0; structures.len() * ANGLES_PER_RESIDUE * max_len];
        for (entry, rows) in per_structure.iter().enumerate() {
            for (residue, row) in rows.iter().enumerate() {
                for (angle, value) in row.iter().enumerate() {
                    data[(entry * ANGLES_PER_RESIDUE + angle) * max_len + residue] = *value;
                }
            }
        }
        Ok(AngleBatch {
            data,
            lengths,
            max_len,
        })
    }
}

fn forward_backbone(ca: Vec3, n: Vec3, c: Vec3, next: &Residue) -> TorsionResult<(f64, f64)> {
    let n_next = next.require("N")?;
    let ca_next = next.require("CA")?;
    Ok((dihedral(n, ca, c, n_next), dihedral(ca, c, n_next, ca_next)))
}
