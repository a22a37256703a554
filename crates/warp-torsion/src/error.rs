use thiserror::Error;

#[derive(Debug, Error)]
pub enum TorsionError {
    #[error("missing atom: {0}")]
    MissingAtom(String),
    #[error("unknown residue: {0}")]
    UnknownResidue(String),
    #[error("empty structure: {0}")]
    Empty(String),
    #[error("invalid atom records: {0}")]
    InvalidRecords(String),
    #[error("rotamer table error: {0}")]
    Table(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TorsionResult<T> = Result<T, TorsionError>;
