//! Minimum-image displacements under periodic boundary conditions.

use nalgebra::{Matrix3, Vector3};
use tracing::info;

use super::{displace, Distance};
use crate::error::{QmcError, Result};

/// Tolerance on pairwise dot products of lattice vectors for the orthogonal path.
const ORTHO_TOL: f64 = 1e-10;

/// Simulation cell: lattice vectors stored as the rows of `latvec`.
#[derive(Debug, Clone)]
pub struct Lattice {
    latvec: Matrix3<f64>,
    invvec: Matrix3<f64>,
    /// Translations to the 27 cells around (and including) the home cell.
    shifts: Vec<Vector3<f64>>,
    orthogonal: bool,
}

impl Lattice {
    pub fn new(latvec: Matrix3<f64>) -> Result<Self> {
        let invvec = latvec.try_inverse().ok_or(QmcError::SingularLattice)?;

        let a = latvec.row(0).transpose();
        let b = latvec.row(1).transpose();
        let c = latvec.row(2).transpose();
        let orthogonal = a.dot(&b).abs() < ORTHO_TOL
            && b.dot(&c).abs() < ORTHO_TOL
            && c.dot(&a).abs() < ORTHO_TOL;

        let mut shifts = Vec::with_capacity(27);
        for i in -1..=1 {
            for j in -1..=1 {
                for k in -1..=1 {
                    let point = Vector3::new(i as f64, j as f64, k as f64);
                    shifts.push(latvec.transpose() * point);
                }
            }
        }

        Ok(Self { latvec, invvec, shifts, orthogonal })
    }

    pub fn is_orthogonal(&self) -> bool {
        self.orthogonal
    }

    pub fn shifts(&self) -> &[Vector3<f64>] {
        &self.shifts
    }

    pub fn to_fractional(&self, r: &Vector3<f64>) -> Vector3<f64> {
        self.invvec.transpose() * r
    }

    pub fn to_cartesian(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.latvec.transpose() * frac
    }
}

type ImageFn = fn(&Lattice, Vector3<f64>) -> Vector3<f64>;

/// Shortest of the 27 neighbouring-cell images of `d`.
///
/// Only adjacent cells are searched, so strongly skewed cells can miss the
/// true minimum image.
fn general_image(lattice: &Lattice, d: Vector3<f64>) -> Vector3<f64> {
    let mut best = d + lattice.shifts[0];
    let mut best_norm = best.norm();
    for shift in &lattice.shifts[1..] {
        let candidate = d + shift;
        let norm = candidate.norm();
        if norm < best_norm {
            best = candidate;
            best_norm = norm;
        }
    }
    best
}

/// Wrap fractional coordinates into [-0.5, 0.5); exact for orthogonal cells.
fn orthogonal_image(lattice: &Lattice, d: Vector3<f64>) -> Vector3<f64> {
    let frac = lattice
        .to_fractional(&d)
        .map(|f| (f + 0.5).rem_euclid(1.0) - 0.5);
    lattice.to_cartesian(&frac)
}

/// Minimum-image distances. The search algorithm is fixed at construction
/// from the orthogonality of the lattice vectors.
#[derive(Debug, Clone)]
pub struct MinimalImageDistance {
    lattice: Lattice,
    image: ImageFn,
}

impl MinimalImageDistance {
    pub fn new(latvec: Matrix3<f64>) -> Result<Self> {
        Ok(Self::from_lattice(Lattice::new(latvec)?))
    }

    pub fn from_lattice(lattice: Lattice) -> Self {
        let image: ImageFn = if lattice.is_orthogonal() {
            info!("Orthogonal lattice vectors");
            orthogonal_image
        } else {
            info!("Non-orthogonal lattice vectors");
            general_image
        };
        Self { lattice, image }
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Exhaustive search over the 27 neighbouring images.
    pub fn general_dist_i(
        &self,
        configs: &[Vec<Vector3<f64>>],
        vec: &[Vector3<f64>],
    ) -> Result<Vec<Vec<Vector3<f64>>>> {
        displace(configs, vec, |d| general_image(&self.lattice, d))
    }

    /// Fractional-coordinate wrapping; only valid for orthogonal lattices.
    pub fn orthogonal_dist_i(
        &self,
        configs: &[Vec<Vector3<f64>>],
        vec: &[Vector3<f64>],
    ) -> Result<Vec<Vec<Vector3<f64>>>> {
        displace(configs, vec, |d| orthogonal_image(&self.lattice, d))
    }
}

impl Distance for MinimalImageDistance {
    fn dist_i(&self, configs: &[Vec<Vector3<f64>>], vec: &[Vector3<f64>]) -> Result<Vec<Vec<Vector3<f64>>>> {
        let image = self.image;
        displace(configs, vec, |d| image(&self.lattice, d))
    }
}
