//! IO module - run configuration files.

mod config;

pub use config::{coefficient_matrix, MoleculeConfig, ObdmConfig, OrbitalConfig, RunConfig};
