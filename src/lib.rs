//! Rust VMC - variational Monte Carlo sampling for molecules and solids.
//!
//! The crate evolves an ensemble of independent walkers with single-electron
//! Metropolis moves and evaluates pluggable accumulators after every step.
//! It provides:
//! - charge-weighted initial configurations ([`sampling::initial_guess`])
//! - open and minimum-image periodic distances ([`distance`])
//! - the VMC driver ([`VmcSimulation`]) and run statistics ([`sampling::stats`])
//! - a one-body density matrix estimator with its own auxiliary chain ([`ObdmAccumulator`])
//! - Slater determinant and Padé-Jastrow wavefunctions over a Gaussian basis

pub mod accumulators;
pub mod correlation;
pub mod distance;
pub mod ensemble;
pub mod error;
pub mod io;
pub mod sampling;
pub mod systems;
pub mod wavefunction;

// Re-export commonly used types at crate root
pub use accumulators::{normalize_obdm, DipoleAccumulator, ObdmAccumulator, ObdmParams};
pub use correlation::{JastrowParams, PadeJastrow};
pub use distance::{boundary, Distance, MinimalImageDistance, RawDistance};
pub use ensemble::Ensemble;
pub use error::{QmcError, Result};
pub use io::RunConfig;
pub use sampling::{initial_guess, initial_guess_vectorized, Accumulator, StepAverages, VmcParams, VmcSimulation};
pub use systems::{MolecularSystem, Molecule};
pub use wavefunction::{Product, SlaterDeterminant, Wavefunction};
