//! YAML run configuration.
//!
//! ```yaml
//! seed: 42
//! nconfig: 200
//! vmc:
//!   nsteps: 500
//!   tstep: 0.5
//! warmup: 50
//! molecule:
//!   nelec: [1, 1]
//!   atoms:
//!     - symbol: H
//!       charge: 1.0
//!       position: [0.0, 0.0, -0.7]
//!       shells:
//!         - l: 0
//!           exponents: [3.42525091, 0.62391373, 0.16885540]
//!           coefficients: [0.15432897, 0.53532814, 0.44463454]
//!     - ...
//! orbitals:
//!   up: [[0.5489], [0.5489]]
//! jastrow:
//!   b: 1.0
//! obdm:
//!   orb_coeff: [[1.0, 0.0], [0.0, 1.0]]
//!   nstep: 10
//!   spin: 0
//! ```

use std::path::Path;

use nalgebra::{DMatrix, Matrix3};
use serde::{Deserialize, Serialize};

use crate::accumulators::ObdmParams;
use crate::correlation::JastrowParams;
use crate::error::{QmcError, Result};
use crate::sampling::{VmcParams, DEFAULT_SPREAD};
use crate::systems::{Atom, Molecule};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub seed: u64,
    /// Number of walkers
    #[serde(default = "default_nconfig")]
    pub nconfig: usize,
    /// Gaussian spread of the initial electron positions
    #[serde(default = "default_spread")]
    pub init_spread: f64,
    /// Use the batched initial guess
    #[serde(default)]
    pub vectorized_init: bool,
    #[serde(default)]
    pub vmc: VmcParams,
    /// Steps discarded before computing statistics
    #[serde(default)]
    pub warmup: usize,
    pub molecule: MoleculeConfig,
    pub orbitals: OrbitalConfig,
    #[serde(default)]
    pub jastrow: Option<JastrowParams>,
    /// Lattice vectors as rows; enables periodic Jastrow distances
    #[serde(default)]
    pub lattice: Option<[[f64; 3]; 3]>,
    #[serde(default)]
    pub obdm: Option<ObdmConfig>,
}

fn default_nconfig() -> usize {
    100
}

fn default_spread() -> f64 {
    DEFAULT_SPREAD
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MoleculeConfig {
    pub atoms: Vec<Atom>,
    pub nelec: [usize; 2],
}

/// Occupied orbital coefficients, one row per basis function.
///
/// Without `down` the determinant is restricted: both spins occupy the
/// leading columns of `up`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrbitalConfig {
    pub up: Vec<Vec<f64>>,
    #[serde(default)]
    pub down: Option<Vec<Vec<f64>>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ObdmConfig {
    /// Target orbitals, one row per basis function
    pub orb_coeff: Vec<Vec<f64>>,
    #[serde(flatten)]
    pub params: ObdmParams,
}

/// Row-major table into an `nbasis × ncols` matrix.
pub fn coefficient_matrix(rows: &[Vec<f64>], nbasis: usize) -> Result<DMatrix<f64>> {
    if rows.len() != nbasis {
        return Err(QmcError::InvalidArgument(format!(
            "coefficient table has {} rows, basis has {} functions",
            rows.len(),
            nbasis
        )));
    }
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != ncols) {
        return Err(QmcError::InvalidArgument("coefficient rows differ in length".into()));
    }
    Ok(DMatrix::from_fn(nbasis, ncols, |i, j| rows[i][j]))
}

impl RunConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn build_molecule(&self) -> Result<Molecule> {
        Molecule::new(self.molecule.atoms.clone(), self.molecule.nelec)
    }

    pub fn lattice_vectors(&self) -> Option<Matrix3<f64>> {
        self.lattice.map(|rows| Matrix3::from_fn(|i, j| rows[i][j]))
    }

    pub fn obdm_coefficients(&self, nbasis: usize) -> Result<Option<DMatrix<f64>>> {
        self.obdm
            .as_ref()
            .map(|obdm| coefficient_matrix(&obdm.orb_coeff, nbasis))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::MolecularSystem;

    const H2: &str = r#"
seed: 7
vmc:
  nsteps: 20
  tstep: 0.4
molecule:
  nelec: [1, 1]
  atoms:
    - symbol: H
      charge: 1.0
      position: [0.0, 0.0, -0.7]
      shells:
        - l: 0
          exponents: [3.42525091, 0.62391373, 0.16885540]
          coefficients: [0.15432897, 0.53532814, 0.44463454]
    - symbol: H
      charge: 1.0
      position: [0.0, 0.0, 0.7]
      shells:
        - l: 0
          exponents: [3.42525091, 0.62391373, 0.16885540]
          coefficients: [0.15432897, 0.53532814, 0.44463454]
orbitals:
  up: [[0.5489], [0.5489]]
lattice: [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]
obdm:
  orb_coeff: [[1.0, 0.0], [0.0, 1.0]]
  nstep: 4
  spin: 1
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = RunConfig::from_yaml(H2).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.nconfig, 100);
        assert_eq!(config.init_spread, 1.0);
        assert!(!config.vectorized_init);
        assert_eq!(config.vmc, VmcParams { nsteps: 20, tstep: 0.4 });
        assert!(config.jastrow.is_none());

        let obdm = config.obdm.as_ref().unwrap();
        assert_eq!(obdm.params.nstep, 4);
        assert_eq!(obdm.params.naux, 500);
        assert_eq!(obdm.params.spin, Some(1));

        let mol = config.build_molecule().unwrap();
        assert_eq!(mol.nbasis(), 2);
        assert_eq!(mol.nelec(), [1, 1]);
        assert_eq!(config.lattice_vectors().unwrap(), Matrix3::from_diagonal_element(4.0));
        assert_eq!(config.obdm_coefficients(2).unwrap().unwrap(), DMatrix::identity(2, 2));
    }

    #[test]
    fn test_coefficient_matrix() {
        let m = coefficient_matrix(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]], 3).unwrap();
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m[(2, 1)], 6.0);
        assert_eq!(coefficient_matrix(&[vec![], vec![]], 2).unwrap().shape(), (2, 0));
        assert!(coefficient_matrix(&[vec![1.0]], 2).is_err());
        assert!(coefficient_matrix(&[vec![1.0], vec![1.0, 2.0]], 2).is_err());
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(RunConfig::from_yaml("nconfig: [1"), Err(QmcError::Config(_))));
        assert!(matches!(RunConfig::load("/nonexistent/run.yml"), Err(QmcError::Io(_))));
    }
}
