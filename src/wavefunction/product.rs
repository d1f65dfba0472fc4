//! Product of two wavefunctions, e.g. Slater × Jastrow.

use nalgebra::Vector3;

use super::traits::Wavefunction;
use crate::ensemble::Ensemble;
use crate::error::Result;

/// Ψ = Ψ_a × Ψ_b. Ratios multiply; both factors see every update.
pub struct Product<A, B> {
    pub a: A,
    pub b: B,
}

impl<A: Wavefunction, B: Wavefunction> Product<A, B> {
    pub fn new(a: A, b: B) -> Self {
        Self { a, b }
    }
}

impl<A: Wavefunction, B: Wavefunction> Wavefunction for Product<A, B> {
    fn recompute(&mut self, configs: &Ensemble) -> Result<()> {
        self.a.recompute(configs)?;
        self.b.recompute(configs)
    }

    fn test_value(&self, e: usize, epos: &[Vector3<f64>]) -> Result<Vec<f64>> {
        let rb = self.b.test_value(e, epos)?;
        Ok(self.a.test_value(e, epos)?.into_iter().zip(rb).map(|(ra, rb)| ra * rb).collect())
    }

    fn update_internals(&mut self, e: usize, epos: &[Vector3<f64>], accept: &[bool]) -> Result<()> {
        self.a.update_internals(e, epos, accept)?;
        self.b.update_internals(e, epos, accept)
    }
}
