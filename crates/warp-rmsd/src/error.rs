use thiserror::Error;

#[derive(Debug, Error)]
pub enum RmsdError {
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
    #[error("invalid size: {0}")]
    InvalidSize(String),
    #[error("non-finite result: {0}")]
    NaNResult(String),
    #[error("degenerate gradient: {0}")]
    DegenerateGradient(String),
    #[error("stale alignment state: {0}")]
    StaleState(String),
    #[error("solver failed: {0}")]
    Solver(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
}

pub type RmsdResult<T> = Result<T, RmsdError>;

impl RmsdError {
    /// Short machine-readable code used in streamed error events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DegenerateInput(_) => "degenerate_input",
            Self::InvalidSize(_) => "invalid_size",
            Self::NaNResult(_) => "nan_result",
            Self::DegenerateGradient(_) => "degenerate_gradient",
            Self::StaleState(_) => "stale_state",
            Self::Solver(_) => "solver",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Parse(_) => "parse",
        }
    }

    /// Prefixes the message with the batch entry it came from.
    pub fn in_entry(self, index: usize) -> Self {
        match self {
            Self::DegenerateInput(m) => Self::DegenerateInput(format!("entry {index}: {m}")),
            Self::InvalidSize(m) => Self::InvalidSize(format!("entry {index}: {m}")),
            Self::NaNResult(m) => Self::NaNResult(format!("entry {index}: {m}")),
            Self::DegenerateGradient(m) => {
                Self::DegenerateGradient(format!("entry {index}: {m}"))
            }
            Self::Solver(m) => Self::Solver(format!("entry {index}: {m}")),
            other => other,
        }
    }
}
