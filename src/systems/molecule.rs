//! Molecule with contracted Cartesian Gaussian basis functions.
//!
//! Each atom carries a list of shells; a shell of angular momentum `l`
//! expands into all Cartesian components `x^lx y^ly z^lz` with `lx + ly + lz = l`.

use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::traits::MolecularSystem;
use crate::error::{QmcError, Result};

/// Contracted shell: shared exponents and contraction coefficients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Shell {
    /// Angular momentum (0 = s, 1 = p, ...)
    pub l: u32,
    pub exponents: Vec<f64>,
    pub coefficients: Vec<f64>,
}

impl Shell {
    /// STO-3G hydrogen 1s.
    pub fn sto3g_h1s() -> Self {
        Self {
            l: 0,
            exponents: vec![3.42525091, 0.62391373, 0.16885540],
            coefficients: vec![0.15432897, 0.53532814, 0.44463454],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Atom {
    pub symbol: String,
    pub charge: f64,
    pub position: Vector3<f64>,
    #[serde(default)]
    pub shells: Vec<Shell>,
}

fn factorial(n: i32) -> f64 {
    (1..=n).fold(1.0, |acc, x| acc * x as f64)
}

/// Normalization of the 1D primitive `x^l exp(-alpha x^2)`.
fn norm_1d(alpha: f64, l: i32) -> f64 {
    let numerator = 2.0_f64.powi(3 * l) * factorial(l) * alpha.powi(l);
    let n_squared = numerator * (2.0 * alpha / PI).sqrt() / factorial(2 * l);
    n_squared.sqrt()
}

/// One Cartesian component of a contracted shell.
#[derive(Debug, Clone)]
struct BasisFunction {
    center: Vector3<f64>,
    powers: [i32; 3],
    /// `(alpha, coefficient × primitive norm)`
    primitives: Vec<(f64, f64)>,
}

impl BasisFunction {
    fn new(center: Vector3<f64>, powers: [i32; 3], shell: &Shell) -> Self {
        let primitives = shell
            .exponents
            .iter()
            .zip(&shell.coefficients)
            .map(|(&alpha, &c)| {
                let norm: f64 = powers.iter().map(|&l| norm_1d(alpha, l)).product();
                (alpha, c * norm)
            })
            .collect();
        Self { center, powers, primitives }
    }

    fn evaluate(&self, r: &Vector3<f64>) -> f64 {
        let dr = r - self.center;
        let r2 = dr.norm_squared();
        let angular = dr.x.powi(self.powers[0]) * dr.y.powi(self.powers[1]) * dr.z.powi(self.powers[2]);
        let radial: f64 = self.primitives.iter().map(|&(alpha, c)| c * (-alpha * r2).exp()).sum();
        angular * radial
    }
}

/// Cartesian exponent triples for angular momentum `l`, in xx..zz order.
fn cartesian_powers(l: u32) -> Vec<[i32; 3]> {
    let l = l as i32;
    let mut powers = Vec::new();
    for lx in (0..=l).rev() {
        for ly in (0..=l - lx).rev() {
            powers.push([lx, ly, l - lx - ly]);
        }
    }
    powers
}

/// A molecule: atoms, electron counts and the expanded basis.
#[derive(Debug, Clone)]
pub struct Molecule {
    atoms: Vec<Atom>,
    coords: Vec<Vector3<f64>>,
    charges: Vec<f64>,
    nelec: [usize; 2],
    basis: Vec<BasisFunction>,
}

impl Molecule {
    pub fn new(atoms: Vec<Atom>, nelec: [usize; 2]) -> Result<Self> {
        if atoms.is_empty() {
            return Err(QmcError::InvalidArgument("molecule has no atoms".into()));
        }
        for atom in &atoms {
            for shell in &atom.shells {
                if shell.exponents.len() != shell.coefficients.len() {
                    return Err(QmcError::InvalidArgument(format!(
                        "shell on {} has {} exponents but {} coefficients",
                        atom.symbol,
                        shell.exponents.len(),
                        shell.coefficients.len()
                    )));
                }
            }
        }

        Ok(Self::assemble(atoms, nelec))
    }

    /// H2 along z with bond length `bond` (Bohr), STO-3G basis, one electron per spin.
    pub fn h2(bond: f64) -> Self {
        let atoms = [-0.5 * bond, 0.5 * bond]
            .iter()
            .map(|&z| Atom {
                symbol: "H".to_string(),
                charge: 1.0,
                position: Vector3::new(0.0, 0.0, z),
                shells: vec![Shell::sto3g_h1s()],
            })
            .collect();
        Self::assemble(atoms, [1, 1])
    }

    fn assemble(atoms: Vec<Atom>, nelec: [usize; 2]) -> Self {
        let basis = atoms
            .iter()
            .flat_map(|atom| {
                atom.shells.iter().flat_map(move |shell| {
                    cartesian_powers(shell.l)
                        .into_iter()
                        .map(move |powers| BasisFunction::new(atom.position, powers, shell))
                })
            })
            .collect();
        let coords = atoms.iter().map(|a| a.position).collect();
        let charges = atoms.iter().map(|a| a.charge).collect();
        Self { atoms, coords, charges, nelec, basis }
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }
}

impl MolecularSystem for Molecule {
    fn atom_coords(&self) -> &[Vector3<f64>] {
        &self.coords
    }

    fn atom_charges(&self) -> &[f64] {
        &self.charges
    }

    fn nelec(&self) -> [usize; 2] {
        self.nelec
    }

    fn nbasis(&self) -> usize {
        self.basis.len()
    }

    fn eval_basis(&self, points: &[Vector3<f64>]) -> DMatrix<f64> {
        DMatrix::from_fn(points.len(), self.basis.len(), |i, j| self.basis[j].evaluate(&points[i]))
    }
}
