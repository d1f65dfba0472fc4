//! Interface the sampler needs from a molecular system.

use nalgebra::{DMatrix, Vector3};

/// Atoms, electron counts and a batched basis-function evaluator.
pub trait MolecularSystem {
    /// Nuclear positions.
    fn atom_coords(&self) -> &[Vector3<f64>];

    /// Nuclear charges, same order as `atom_coords`.
    fn atom_charges(&self) -> &[f64];

    /// Electron count per spin channel `[up, down]`.
    fn nelec(&self) -> [usize; 2];

    /// Number of basis functions returned by `eval_basis`.
    fn nbasis(&self) -> usize;

    /// Amplitudes of every basis function at every point, `npoints × nbasis`.
    fn eval_basis(&self, points: &[Vector3<f64>]) -> DMatrix<f64>;

    fn total_electrons(&self) -> usize {
        let [up, down] = self.nelec();
        up + down
    }
}
