//! Traits for Monte Carlo sampling.

use std::collections::BTreeMap;

use nalgebra::DMatrix;
use rand::RngCore;

use crate::ensemble::Ensemble;
use crate::error::Result;

/// Named per-walker observables: `name -> [walker] -> value`.
///
/// Scalars are stored as `1 × 1`, vectors as `k × 1`.
pub type WalkerData = BTreeMap<String, Vec<DMatrix<f64>>>;

/// Observable evaluated once per step on the whole ensemble.
///
/// Accumulators that need random numbers draw them from the driver's
/// generator, so a single seed reproduces a run.
pub trait Accumulator<S, W> {
    fn accumulate(&mut self, system: &S, configs: &Ensemble, wf: &W, rng: &mut dyn RngCore) -> Result<WalkerData>;
}
