//! Flat atom records grouped into chains of residues.

use serde::{Deserialize, Serialize};
use warp_rmsd::Vec3;

use crate::error::{TorsionError, TorsionResult};

/// One atom as stored in a flat per-structure listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomRecord {
    pub chain: String,
    pub res_name: String,
    pub res_num: i32,
    pub atom_name: String,
    pub coord: [f64; 3],
}

impl AtomRecord {
    pub fn new(chain: &str, res_name: &str, res_num: i32, atom_name: &str, coord: Vec3) -> Self {
        Self {
            chain: chain.to_string(),
            res_name: res_name.to_string(),
            res_num,
            atom_name: atom_name.to_string(),
            coord: coord.to_array(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Atom {
    pub name: String,
    pub coord: Vec3,
}

#[derive(Debug, Clone)]
pub struct Residue {
    pub name: String,
    pub number: i32,
    pub atoms: Vec<Atom>,
}

impl Residue {
    pub fn new(name: &str, number: i32) -> Self {
        Self {
            name: name.to_string(),
            number,
            atoms: Vec::new(),
        }
    }

    pub fn add_atom(&mut self, name: &str, coord: Vec3) {
        self.atoms.push(Atom {
            name: name.to_string(),
            coord,
        });
    }

    /// Find atom by name, returning its coordinate.
    pub fn atom_coord(&self, name: &str) -> Option<Vec3> {
        self.atoms.iter().find(|a| a.name == name).map(|a| a.coord)
    }

    /// Like [`Residue::atom_coord`] but a missing atom is an error.
    pub fn require(&self, name: &str) -> TorsionResult<Vec3> {
        self.atom_coord(name).ok_or_else(|| {
            TorsionError::MissingAtom(format!("{} {} has no atom {name}", self.name, self.number))
        })
    }
}

#[derive(Debug, Clone)]
pub struct Chain {
    pub id: String,
    pub residues: Vec<Residue>,
}

impl Chain {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            residues: Vec::new(),
        }
    }
}

/// Groups consecutive records into residues and chains.
///
/// A new chain starts whenever the chain label changes, and a new residue
/// whenever the residue number changes or a new chain starts. Records are
/// never reordered.
pub fn group_residues(records: &[AtomRecord]) -> TorsionResult<Vec<Chain>> {
    let Some(first) = records.first() else {
        return Err(TorsionError::Empty("no atom records".into()));
    };
    let mut chains = Vec::new();
    let mut chain = Chain::new(&first.chain);
    let mut residue = Residue::new(&first.res_name, first.res_num);

    for record in records {
        let new_chain = record.chain != chain.id;
        if new_chain || record.res_num != residue.number {
            chain.residues.push(residue);
            residue = Residue::new(&record.res_name, record.res_num);
        }
        if new_chain {
            let finished = std::mem::replace(&mut chain, Chain::new(&record.chain));
            chains.push(finished);
        }
        residue.add_atom(&record.atom_name, Vec3::from_array(record.coord));
    }
    chain.residues.push(residue);
    chains.push(chain);
    Ok(chains)
}

/// Builds records from column-wise arrays: flat coordinates plus one label
/// per atom. Only the first `num_atoms` atoms are read.
pub fn records_from_columns(
    coords: &[f64],
    chains: &[String],
    res_names: &[String],
    res_nums: &[i32],
    atom_names: &[String],
    num_atoms: usize,
) -> TorsionResult<Vec<AtomRecord>> {
    let columns = [chains.len(), res_names.len(), res_nums.len(), atom_names.len()];
    if coords.len() < 3 * num_atoms || columns.iter().any(|&len| len < num_atoms) {
        return Err(TorsionError::InvalidRecords(format!(
            "{num_atoms} atoms requested but columns hold {} coordinates and {columns:?} labels",
            coords.len()
        )));
    }
    Ok((0..num_atoms)
        .map(|i| AtomRecord {
            chain: chains[i].clone(),
            res_name: res_names[i].clone(),
            res_num: res_nums[i],
            atom_name: atom_names[i].clone(),
            coord: [coords[3 * i], coords[3 * i + 1], coords[3 * i + 2]],
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(chain: &str, name: &str, num: i32, atom: &str) -> AtomRecord {
        AtomRecord::new(chain, name, num, atom, Vec3::new(num as f64, 0.0, 0.0))
    }

    #[test]
    fn groups_by_number_and_chain() {
        let records = vec![
            rec("A", "ALA", 1, "N"),
            rec("A", "ALA", 1, "CA"),
            rec("A", "GLY", 2, "N"),
            rec("B", "SER", 1, "N"),
            rec("B", "SER", 1, "CA"),
        ];
        let chains = group_residues(&records).unwrap();
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].residues.len(), 2);
        assert_eq!(chains[0].residues[0].atoms.len(), 2);
        assert_eq!(chains[1].id, "B");
        assert_eq!(chains[1].residues[0].name, "SER");
        assert_eq!(chains[1].residues[0].atoms.len(), 2);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(group_residues(&[]), Err(TorsionError::Empty(_))));
    }

    #[test]
    fn require_reports_missing_atom() {
        let mut res = Residue::new("SER", 4);
        res.add_atom("N", Vec3::zero());
        assert!(res.require("N").is_ok());
        let err = res.require("OG").unwrap_err();
        assert!(err.to_string().contains("SER 4 has no atom OG"));
    }

    #[test]
    fn columns_are_zipped() {
        let coords = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 9.0, 9.0, 9.0];
        let labels = |s: &str| vec![s.to_string(); 3];
        let records = records_from_columns(
            &coords,
            &labels("A"),
            &labels("GLY"),
            &[1, 1, 2],
            &["N".into(), "CA".into(), "N".into()],
            2,
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].coord, [3.0, 4.0, 5.0]);
        assert!(records_from_columns(&coords, &labels("A"), &[], &[1], &[], 2).is_err());
    }
}
