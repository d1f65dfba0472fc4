//! Error type shared by the sampling library.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QmcError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Lattice vectors are linearly dependent")]
    SingularLattice,

    #[error("Slater matrix for spin {spin} of walker {walker} is singular")]
    SingularMatrix { walker: usize, spin: usize },

    #[error("Sampling failed: {0}")]
    Sampling(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Config(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, QmcError>;
