//! Wavefunction module - incremental trial wavefunctions for QMC calculations.

mod product;
mod slater;
mod traits;

pub use product::Product;
pub use slater::SlaterDeterminant;
pub use traits::Wavefunction;
