//! Wave function trait for single-electron Metropolis moves.

use nalgebra::Vector3;

use crate::ensemble::Ensemble;
use crate::error::Result;

/// Many-electron wavefunction evaluated incrementally over a walker ensemble.
///
/// Implementations cache whatever per-walker state makes single-electron
/// ratios cheap; `recompute` rebuilds it from scratch and `update_internals`
/// keeps it consistent after each accepted move.
pub trait Wavefunction {
    /// Rebuild all cached state from a complete ensemble.
    fn recompute(&mut self, configs: &Ensemble) -> Result<()>;

    /// Ψ(R') / Ψ(R) per walker, where R' moves electron `e` to `epos[walker]`.
    fn test_value(&self, e: usize, epos: &[Vector3<f64>]) -> Result<Vec<f64>>;

    /// Commit electron `e` at `epos` for walkers where `accept` is set.
    fn update_internals(&mut self, e: usize, epos: &[Vector3<f64>], accept: &[bool]) -> Result<()>;
}
