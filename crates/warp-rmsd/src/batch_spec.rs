//! JSON batch input for the command line tool.
//!
//! ```json
//! {
//!   "source": [[2.0, 0.0, 0.0, 3.0, 0.1, 1.0, 3.0, 0.1, 0.0]],
//!   "target": [[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 3.0, 0.0, 0.0]],
//!   "capacity": 5,
//!   "grad_output": [1.0]
//! }
//! ```
//!
//! Entries are flat `x, y, z` triples and may differ in length between
//! pairs; each source must be as long as its target. `capacity` defaults to
//! the longest entry. `grad_output` defaults to ones.

use std::path::Path;

use serde::Deserialize;

use crate::error::{RmsdError, RmsdResult};
use crate::padding::{pad, PaddedBatch};

#[derive(Debug, Clone, Deserialize)]
pub struct BatchSpec {
    pub source: Vec<Vec<f64>>,
    pub target: Vec<Vec<f64>>,
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub grad_output: Option<Vec<f64>>,
}

/// Padded source and target with shared counts.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub source: PaddedBatch,
    pub target: PaddedBatch,
    pub grad_output: Vec<f64>,
}

impl PreparedBatch {
    pub fn counts(&self) -> &[usize] {
        &self.source.counts
    }
}

impl BatchSpec {
    pub fn from_file(path: &Path) -> RmsdResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
            .map_err(|e| RmsdError::Parse(format!("invalid batch in '{}': {e}", path.display())))
    }

    pub fn from_json(text: &str) -> RmsdResult<Self> {
        serde_json::from_str(text).map_err(|e| RmsdError::Parse(e.to_string()))
    }

    /// Pads both sides. `fixed_capacity` (from config) wins over the file's
    /// own `capacity`.
    pub fn prepare(&self, fixed_capacity: Option<usize>) -> RmsdResult<PreparedBatch> {
        if self.source.is_empty() {
            return Err(RmsdError::InvalidSize("batch has no entries".into()));
        }
        if self.source.len() != self.target.len() {
            return Err(RmsdError::InvalidSize(format!(
                "{} source entries but {} target entries",
                self.source.len(),
                self.target.len()
            )));
        }
        for (index, (s, t)) in self.source.iter().zip(&self.target).enumerate() {
            if s.len() != t.len() {
                return Err(RmsdError::InvalidSize(format!(
                    "entry {index}: source has {} values, target has {}",
                    s.len(),
                    t.len()
                )));
            }
        }
        let longest = self.source.iter().map(|e| e.len() / 3).max().unwrap_or(0);
        let capacity = fixed_capacity.or(self.capacity).unwrap_or(longest).max(1);

        let grad_output = match &self.grad_output {
            Some(g) => g.clone(),
            None => vec![1.0; self.source.len()],
        };
        Ok(PreparedBatch {
            source: pad(&self.source, capacity)?,
            target: pad(&self.target, capacity)?,
            grad_output,
        })
    }
}
