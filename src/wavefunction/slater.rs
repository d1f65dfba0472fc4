//! Slater determinant wavefunction with Sherman-Morrison updates.

use nalgebra::{DMatrix, Vector3};

use super::traits::Wavefunction;
use crate::ensemble::Ensemble;
use crate::error::{QmcError, Result};
use crate::systems::MolecularSystem;

/// Below this magnitude a determinant ratio is treated as a node crossing.
const RATIO_EPS: f64 = 1e-300;

/// Product of one determinant per spin channel, Ψ = D↑ × D↓.
///
/// `mo_coeff[s]` is `nbasis × nelec[s]`: occupied orbitals of spin `s`
/// expanded in the system's basis. For every walker the inverse of the
/// Slater matrix `M[i][j] = φ_j(r_i)` is cached.
pub struct SlaterDeterminant<S: MolecularSystem> {
    system: S,
    mo_coeff: [DMatrix<f64>; 2],
    nelec: [usize; 2],
    inverse: [Vec<DMatrix<f64>>; 2],
}

impl<S: MolecularSystem> SlaterDeterminant<S> {
    pub fn new(system: S, mo_coeff: [DMatrix<f64>; 2]) -> Result<Self> {
        let nelec = system.nelec();
        for s in 0..2 {
            if mo_coeff[s].shape() != (system.nbasis(), nelec[s]) {
                return Err(QmcError::InvalidArgument(format!(
                    "spin {} orbitals have shape {:?}, expected ({}, {})",
                    s,
                    mo_coeff[s].shape(),
                    system.nbasis(),
                    nelec[s]
                )));
            }
        }
        Ok(Self {
            system,
            mo_coeff,
            nelec,
            inverse: [Vec::new(), Vec::new()],
        })
    }

    /// Restricted determinant: the same occupied orbitals for both spins.
    ///
    /// `mo_coeff` must have at least `max(nelec)` columns.
    pub fn restricted(system: S, mo_coeff: &DMatrix<f64>) -> Result<Self> {
        let nelec = system.nelec();
        let nocc = nelec[0].max(nelec[1]);
        if mo_coeff.ncols() < nocc {
            return Err(QmcError::InvalidArgument(format!(
                "{} orbitals cannot hold {} electrons of one spin",
                mo_coeff.ncols(),
                nocc
            )));
        }
        let up = mo_coeff.columns(0, nelec[0]).clone_owned();
        let down = mo_coeff.columns(0, nelec[1]).clone_owned();
        Self::new(system, [up, down])
    }

    fn locate(&self, e: usize) -> (usize, usize) {
        if e < self.nelec[0] {
            (0, e)
        } else {
            (1, e - self.nelec[0])
        }
    }

    /// Occupied orbitals of spin `s` at each point, `npoints × nelec[s]`.
    fn orbitals(&self, s: usize, points: &[Vector3<f64>]) -> DMatrix<f64> {
        self.system.eval_basis(points) * &self.mo_coeff[s]
    }

    /// Determinant ratio for walker `w` when row `row` of spin `s` becomes `mo.row(w)`.
    fn row_ratio(&self, s: usize, row: usize, w: usize, mo: &DMatrix<f64>) -> f64 {
        mo.row(w).tr_dot(&self.inverse[s][w].column(row))
    }
}

impl<S: MolecularSystem> Wavefunction for SlaterDeterminant<S> {
    fn recompute(&mut self, configs: &Ensemble) -> Result<()> {
        let offsets = [0, self.nelec[0]];
        for s in 0..2 {
            let n = self.nelec[s];
            let mut inverses = Vec::with_capacity(configs.nconfig());
            for (w, walker) in configs.walkers().iter().enumerate() {
                if n == 0 {
                    inverses.push(DMatrix::zeros(0, 0));
                    continue;
                }
                let slater = self.orbitals(s, &walker[offsets[s]..offsets[s] + n]);
                let inverse = slater
                    .try_inverse()
                    .ok_or(QmcError::SingularMatrix { walker: w, spin: s })?;
                inverses.push(inverse);
            }
            self.inverse[s] = inverses;
        }
        Ok(())
    }

    fn test_value(&self, e: usize, epos: &[Vector3<f64>]) -> Result<Vec<f64>> {
        let (s, row) = self.locate(e);
        if epos.len() != self.inverse[s].len() {
            return Err(QmcError::InvalidArgument(format!(
                "{} proposed positions for {} walkers",
                epos.len(),
                self.inverse[s].len()
            )));
        }
        let mo = self.orbitals(s, epos);
        Ok((0..epos.len()).map(|w| self.row_ratio(s, row, w, &mo)).collect())
    }

    fn update_internals(&mut self, e: usize, epos: &[Vector3<f64>], accept: &[bool]) -> Result<()> {
        let (s, row) = self.locate(e);
        let mo = self.orbitals(s, epos);
        for (w, _) in accept.iter().enumerate().filter(|&(_, &ok)| ok) {
            let ratio = self.row_ratio(s, row, w, &mo);
            if ratio.abs() < RATIO_EPS {
                return Err(QmcError::SingularMatrix { walker: w, spin: s });
            }
            let inverse = &mut self.inverse[s][w];
            let mut v = mo.row(w) * &*inverse;
            v[row] -= 1.0;
            let update = (inverse.column(row) * v) / ratio;
            *inverse -= update;
        }
        Ok(())
    }
}
