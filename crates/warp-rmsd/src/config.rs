use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RmsdError, RmsdResult};
use crate::superpose::{SolverOptions, SuperposeMethod};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RmsdConfig {
    /// Fixed atom capacity per entry. When set, inputs must use exactly this
    /// many slots and ragged CLI input is padded to it.
    #[serde(default, alias = "max_num_atoms")]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub method: SuperposeMethod,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Emit NDJSON progress events on stderr.
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_gradcheck_step")]
    pub gradcheck_step: f64,
    #[serde(default = "default_gradcheck_tolerance")]
    pub gradcheck_tolerance: f64,
}

impl Default for RmsdConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            method: SuperposeMethod::default(),
            max_iterations: default_max_iterations(),
            stream: false,
            gradcheck_step: default_gradcheck_step(),
            gradcheck_tolerance: default_gradcheck_tolerance(),
        }
    }
}

impl RmsdConfig {
    /// Validates the values and returns a copy ready for use.
    pub fn normalized(&self) -> RmsdResult<Self> {
        if self.capacity == Some(0) {
            return Err(RmsdError::Config("capacity must be positive".into()));
        }
        if self.max_iterations == 0 {
            return Err(RmsdError::Config("max_iterations must be positive".into()));
        }
        if !(self.gradcheck_step.is_finite() && self.gradcheck_step > 0.0) {
            return Err(RmsdError::Config(format!(
                "gradcheck_step must be a positive number, got {}",
                self.gradcheck_step
            )));
        }
        if !(self.gradcheck_tolerance.is_finite() && self.gradcheck_tolerance > 0.0) {
            return Err(RmsdError::Config(format!(
                "gradcheck_tolerance must be a positive number, got {}",
                self.gradcheck_tolerance
            )));
        }
        Ok(self.clone())
    }

    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            method: self.method,
            max_iterations: self.max_iterations,
        }
    }

    /// Loads JSON or YAML depending on the file extension.
    pub fn from_path(path: &Path) -> RmsdResult<Self> {
        let content = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        let cfg: RmsdConfig = if ext == "yaml" || ext == "yml" {
            serde_yaml::from_str(&content)
                .map_err(|e| RmsdError::Parse(format!("yaml parse error: {e}")))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| RmsdError::Parse(format!("json parse error: {e}")))?
        };
        cfg.normalized()
    }
}

fn default_max_iterations() -> usize {
    1000
}

fn default_gradcheck_step() -> f64 {
    1.0e-3
}

fn default_gradcheck_tolerance() -> f64 {
    1.0e-5
}
