//! Jastrow correlation factors for QMC calculations.
//!
//! Jastrow factors capture electron-electron correlations that are
//! difficult to represent with single-particle orbitals.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::distance::Distance;
use crate::ensemble::Ensemble;
use crate::error::{QmcError, Result};
use crate::wavefunction::Wavefunction;

/// Cusp for parallel-spin pairs.
const CUSP_SAME: f64 = 0.25;
/// Cusp for antiparallel-spin pairs.
const CUSP_ANTI: f64 = 0.5;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct JastrowParams {
    /// Inverse correlation length `b` in `a r / (1 + b r)`
    pub b: f64,
}

impl Default for JastrowParams {
    fn default() -> Self {
        Self { b: 1.0 }
    }
}

/// Two-body Padé-Jastrow factor: J(R) = exp(Σᵢ<ⱼ aᵢⱼ rᵢⱼ / (1 + b rᵢⱼ))
///
/// `aᵢⱼ` is fixed by the electron-electron cusp condition. Distances go
/// through a `Distance`, so the factor works with open or periodic boundaries.
pub struct PadeJastrow {
    params: JastrowParams,
    nelec: [usize; 2],
    distance: Box<dyn Distance>,
    configs: Ensemble,
}

impl PadeJastrow {
    pub fn new(params: JastrowParams, nelec: [usize; 2], distance: Box<dyn Distance>) -> Result<Self> {
        if params.b <= 0.0 {
            return Err(QmcError::InvalidArgument(format!(
                "Jastrow parameter b must be positive, got {}",
                params.b
            )));
        }
        Ok(Self {
            params,
            nelec,
            distance,
            configs: Ensemble::zeros(0, 0),
        })
    }

    fn cusp(&self, i: usize, j: usize) -> f64 {
        if (i < self.nelec[0]) == (j < self.nelec[0]) {
            CUSP_SAME
        } else {
            CUSP_ANTI
        }
    }

    fn u(&self, a: f64, r: f64) -> f64 {
        a * r / (1.0 + self.params.b * r)
    }

    /// ln J for every walker of the cached ensemble.
    pub fn log_value(&self) -> Result<Vec<f64>> {
        let pairs = self.distance.dist_matrix(self.configs.walkers())?;
        if pairs.is_empty() {
            return Ok(vec![0.0; self.configs.nconfig()]);
        }
        Ok(pairs
            .dist
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&pairs.ij)
                    .map(|(d, &(i, j))| self.u(self.cusp(i, j), d.norm()))
                    .sum::<f64>()
            })
            .collect())
    }
}

impl Wavefunction for PadeJastrow {
    fn recompute(&mut self, configs: &Ensemble) -> Result<()> {
        self.configs = configs.clone();
        Ok(())
    }

    fn test_value(&self, e: usize, epos: &[Vector3<f64>]) -> Result<Vec<f64>> {
        let walkers = self.configs.walkers();
        let new = self.distance.dist_i(walkers, epos)?;
        let old = self.distance.dist_i(walkers, &self.configs.electron(e))?;
        Ok(new
            .iter()
            .zip(&old)
            .map(|(dnew, dold)| {
                let delta: f64 = (0..dnew.len())
                    .filter(|&j| j != e)
                    .map(|j| {
                        let a = self.cusp(e, j);
                        self.u(a, dnew[j].norm()) - self.u(a, dold[j].norm())
                    })
                    .sum();
                delta.exp()
            })
            .collect())
    }

    fn update_internals(&mut self, e: usize, epos: &[Vector3<f64>], accept: &[bool]) -> Result<()> {
        self.configs.commit(e, epos, accept);
        Ok(())
    }
}
