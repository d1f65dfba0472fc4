//! One-body reduced density matrix estimator.
//!
//! The estimator of Wagner, J. Chem. Phys. 138, 094106 (2013), eq. (9):
//! a chosen electron is moved to a point drawn from an auxiliary chain that
//! samples `f(r) = Σ_k φ_k(r)²`, and the wavefunction ratio of that move is
//! weighted by the orbital amplitudes at both ends,
//!
//! ```text
//! ρ_jk ≈ N ⟨ Ψ(r'…)/Ψ(r…) · φ_j(r') / f(r') · φ_k(r) ⟩
//! ```
//!
//! `norm_j = ⟨φ_j(r')² / f(r')⟩` estimates the orbital normalisation, so
//! `ρ_jk / sqrt(norm_j norm_k)` is the density matrix in the normalised basis.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector, Vector3};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ensemble::Ensemble;
use crate::error::{QmcError, Result};
use crate::sampling::{check_width, gaussian, initial_guess, walker_mean, Accumulator, WalkerData, DEFAULT_SPREAD};
use crate::systems::MolecularSystem;
use crate::wavefunction::Wavefunction;

/// Estimator parameters; the orbital table is passed separately.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ObdmParams {
    /// Ratio evaluations per call
    #[serde(default = "default_nstep")]
    pub nstep: usize,
    /// Variance of the auxiliary Gaussian proposal
    #[serde(default = "default_tstep")]
    pub tstep: f64,
    /// One-body sweeps run on the auxiliary pool at construction
    #[serde(default = "default_warmup")]
    pub warmup: usize,
    /// Approximate auxiliary pool size
    #[serde(default = "default_naux")]
    pub naux: usize,
    /// Restrict to one spin channel; takes precedence over `electrons`
    #[serde(default)]
    pub spin: Option<usize>,
    /// Restrict to explicit electron indices
    #[serde(default)]
    pub electrons: Option<Vec<usize>>,
}

fn default_nstep() -> usize {
    10
}

fn default_tstep() -> f64 {
    0.5
}

fn default_warmup() -> usize {
    100
}

fn default_naux() -> usize {
    500
}

impl Default for ObdmParams {
    fn default() -> Self {
        Self {
            nstep: default_nstep(),
            tstep: default_tstep(),
            warmup: default_warmup(),
            naux: default_naux(),
            spin: None,
            electrons: None,
        }
    }
}

impl ObdmParams {
    pub fn selection(&self) -> ElectronSelection {
        match (&self.spin, &self.electrons) {
            (Some(s), _) => ElectronSelection::Spin(*s),
            (None, Some(list)) => ElectronSelection::Electrons(list.clone()),
            (None, None) => ElectronSelection::All,
        }
    }
}

/// Which electrons the estimator may move.
#[derive(Debug, Clone, PartialEq)]
pub enum ElectronSelection {
    All,
    Spin(usize),
    Electrons(Vec<usize>),
}

impl ElectronSelection {
    /// Concrete electron indices for a system with `nelec` electrons per spin.
    pub fn resolve(&self, nelec: [usize; 2]) -> Result<Vec<usize>> {
        let total = nelec[0] + nelec[1];
        let electrons: Vec<usize> = match self {
            ElectronSelection::All => (0..total).collect(),
            ElectronSelection::Spin(0) => (0..nelec[0]).collect(),
            ElectronSelection::Spin(1) => (nelec[0]..total).collect(),
            ElectronSelection::Spin(s) => {
                return Err(QmcError::InvalidArgument(format!("spin must be 0 or 1, got {}", s)));
            }
            ElectronSelection::Electrons(list) => {
                if let Some(&e) = list.iter().find(|&&e| e >= total) {
                    return Err(QmcError::InvalidArgument(format!(
                        "electron {} out of range for {} electrons",
                        e, total
                    )));
                }
                list.clone()
            }
        };
        if electrons.is_empty() {
            return Err(QmcError::InvalidArgument(format!("{:?} selects no electrons", self)));
        }
        Ok(electrons)
    }
}

/// One Metropolis sweep of `configs` against `f(r) = Σ_k φ_k(r)²`.
///
/// Every point proposes `r + sqrt(tstep) ξ` independently. Returns the
/// acceptance mask.
pub fn sample_onebody<S, R>(
    system: &S,
    orb_coeff: &DMatrix<f64>,
    configs: &mut [Vector3<f64>],
    tstep: f64,
    rng: &mut R,
) -> Result<Vec<bool>>
where
    S: MolecularSystem,
    R: Rng + ?Sized,
{
    check_width("tstep", tstep)?;
    let normal = gaussian("tstep", tstep.sqrt())?;
    let n = configs.len();
    let mut points = configs.to_vec();
    points.extend(configs.iter().map(|r| r + Vector3::from_distribution(&normal, rng)));

    let borb = system.eval_basis(&points) * orb_coeff;
    let fsum: Vec<f64> = borb.row_iter().map(|row| row.norm_squared()).collect();

    let accept: Vec<bool> = (0..n).map(|i| fsum[n + i] / fsum[i] > rng.gen::<f64>()).collect();
    for (i, _) in accept.iter().enumerate().filter(|&(_, &ok)| ok) {
        configs[i] = points[n + i];
    }
    Ok(accept)
}

/// Divide `obdm` elementwise by `sqrt(norm_i norm_j)`.
pub fn normalize_obdm(obdm: &DMatrix<f64>, norm: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(obdm.nrows(), obdm.ncols(), |i, j| obdm[(i, j)] / (norm[i] * norm[j]).sqrt())
}

/// Stateful OBDM estimator owning its auxiliary chain.
///
/// Each call returns per walker `"value"` (`norb × norb`), `"norm"`
/// (`norb × 1`) and `"acceptance"` (`1 × 1`, the auxiliary chain's mean
/// acceptance, identical across walkers).
#[derive(Debug, Clone)]
pub struct ObdmAccumulator {
    orb_coeff: DMatrix<f64>,
    params: ObdmParams,
    electrons: Vec<usize>,
    aux: Vec<Vector3<f64>>,
}

impl ObdmAccumulator {
    /// Seed the auxiliary pool from the charge-weighted initial guess and
    /// equilibrate it with `params.warmup` one-body sweeps.
    ///
    /// # Arguments
    /// * `orb_coeff` - `nbasis × norb` coefficients of the target orbitals
    pub fn new<S, R>(system: &S, orb_coeff: DMatrix<f64>, params: ObdmParams, rng: &mut R) -> Result<Self>
    where
        S: MolecularSystem,
        R: Rng + ?Sized,
    {
        if orb_coeff.nrows() != system.nbasis() || orb_coeff.ncols() == 0 {
            return Err(QmcError::InvalidArgument(format!(
                "orbital coefficients have shape {:?}, expected ({}, norb > 0)",
                orb_coeff.shape(),
                system.nbasis()
            )));
        }
        check_width("tstep", params.tstep)?;
        let electrons = params.selection().resolve(system.nelec())?;

        let nconfig = params.naux / system.total_electrons() + 1;
        let mut aux = initial_guess(system, nconfig, DEFAULT_SPREAD, rng)?.flatten();
        let mut accepted = 0.0;
        for _ in 0..params.warmup {
            let accept = sample_onebody(system, &orb_coeff, &mut aux, params.tstep, rng)?;
            accepted += fraction(&accept);
        }
        if params.warmup > 0 {
            debug!(
                naux = aux.len(),
                acceptance = accepted / params.warmup as f64,
                "OBDM auxiliary chain equilibrated"
            );
        }

        Ok(Self {
            orb_coeff,
            params,
            electrons,
            aux,
        })
    }

    pub fn norb(&self) -> usize {
        self.orb_coeff.ncols()
    }

    pub fn aux(&self) -> &[Vector3<f64>] {
        &self.aux
    }

    /// Walker average of one estimation call.
    pub fn avg<S, W>(
        &mut self,
        system: &S,
        configs: &Ensemble,
        wf: &W,
        rng: &mut dyn RngCore,
    ) -> Result<BTreeMap<String, DMatrix<f64>>>
    where
        S: MolecularSystem,
        W: Wavefunction,
    {
        let data = self.accumulate(system, configs, wf, rng)?;
        Ok(data.into_iter().map(|(key, rows)| (key, walker_mean(&rows))).collect())
    }
}

fn fraction(accept: &[bool]) -> f64 {
    if accept.is_empty() {
        return 0.0;
    }
    accept.iter().filter(|&&a| a).count() as f64 / accept.len() as f64
}

impl<S: MolecularSystem, W: Wavefunction> Accumulator<S, W> for ObdmAccumulator {
    fn accumulate(&mut self, system: &S, configs: &Ensemble, wf: &W, rng: &mut dyn RngCore) -> Result<WalkerData> {
        let nconfig = configs.nconfig();
        let norb = self.norb();
        let naux = self.aux.len();
        let nelec = self.electrons.len() as f64;

        let mut value = vec![DMatrix::zeros(norb, norb); nconfig];
        let mut norm = vec![DMatrix::zeros(norb, 1); nconfig];
        let mut acceptance = 0.0;

        for _ in 0..self.params.nstep {
            let e = self.electrons[rng.gen_range(0..self.electrons.len())];

            let mut points = self.aux.clone();
            points.extend(configs.electron(e));
            let borb = system.eval_basis(&points) * &self.orb_coeff;
            let borb_aux = borb.rows(0, naux);
            let borb_configs = borb.rows(naux, nconfig);
            let fsum: Vec<f64> = borb_aux.row_iter().map(|row| row.norm_squared()).collect();

            let assignments: Vec<usize> = (0..nconfig).map(|_| rng.gen_range(0..naux)).collect();
            let moved: Vec<Vector3<f64>> = assignments.iter().map(|&a| self.aux[a]).collect();
            let wfratio = wf.test_value(e, &moved)?;

            for (w, &a) in assignments.iter().enumerate() {
                let orb_aux = DMatrix::from_fn(norb, 1, |j, _| borb_aux[(a, j)] / fsum[a]);
                value[w] += (&orb_aux * borb_configs.row(w)) * (nelec * wfratio[w]);
                norm[w] += DMatrix::from_fn(norb, 1, |j, _| orb_aux[(j, 0)] * borb_aux[(a, j)]);
            }

            let accept = sample_onebody(system, &self.orb_coeff, &mut self.aux, self.params.tstep, rng)?;
            acceptance += fraction(&accept);
        }

        let nstep = self.params.nstep.max(1) as f64;
        let acceptance = DMatrix::from_element(1, 1, acceptance / nstep);
        Ok(WalkerData::from([
            ("value".to_string(), value.into_iter().map(|m| m / nstep).collect()),
            ("norm".to_string(), norm.into_iter().map(|m| m / nstep).collect()),
            ("acceptance".to_string(), vec![acceptance; nconfig]),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::Molecule;
    use crate::wavefunction::SlaterDeterminant;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// One normalised Gaussian orbital exp(-α r²) at the origin.
    struct GaussianOrbital {
        alpha: f64,
        coords: Vec<Vector3<f64>>,
        charges: Vec<f64>,
    }

    impl GaussianOrbital {
        fn new(alpha: f64) -> Self {
            Self {
                alpha,
                coords: vec![Vector3::zeros()],
                charges: vec![1.0],
            }
        }
    }

    impl MolecularSystem for GaussianOrbital {
        fn atom_coords(&self) -> &[Vector3<f64>] {
            &self.coords
        }

        fn atom_charges(&self) -> &[f64] {
            &self.charges
        }

        fn nelec(&self) -> [usize; 2] {
            [1, 0]
        }

        fn nbasis(&self) -> usize {
            1
        }

        fn eval_basis(&self, points: &[Vector3<f64>]) -> DMatrix<f64> {
            DMatrix::from_fn(points.len(), 1, |i, _| (-self.alpha * points[i].norm_squared()).exp())
        }
    }

    fn single_electron_h2() -> Molecule {
        Molecule::new(Molecule::h2(1.4).atoms().to_vec(), [1, 0]).unwrap()
    }

    /// Bonding and antibonding orbitals of STO-3G H2 at R = 1.4 (overlap 0.6593).
    fn h2_orbitals() -> DMatrix<f64> {
        let s: f64 = 0.6593;
        let cb = 1.0 / (2.0 * (1.0 + s)).sqrt();
        let ca = 1.0 / (2.0 * (1.0 - s)).sqrt();
        DMatrix::from_row_slice(2, 2, &[cb, ca, cb, -ca])
    }

    #[test]
    fn test_selection() {
        assert_eq!(ElectronSelection::All.resolve([2, 1]).unwrap(), vec![0, 1, 2]);
        assert_eq!(ElectronSelection::Spin(0).resolve([2, 1]).unwrap(), vec![0, 1]);
        assert_eq!(ElectronSelection::Spin(1).resolve([2, 1]).unwrap(), vec![2]);
        assert!(matches!(ElectronSelection::Spin(2).resolve([2, 1]), Err(QmcError::InvalidArgument(_))));
        assert!(ElectronSelection::Spin(1).resolve([2, 0]).is_err());
        assert!(ElectronSelection::Electrons(vec![3]).resolve([2, 1]).is_err());
        assert!(ElectronSelection::Electrons(vec![]).resolve([2, 1]).is_err());

        let params = ObdmParams {
            spin: Some(1),
            electrons: Some(vec![0]),
            ..Default::default()
        };
        assert_eq!(params.selection(), ElectronSelection::Spin(1));
    }

    #[test]
    fn test_invalid_construction() {
        let mut rng = StdRng::seed_from_u64(0);
        let h2 = Molecule::h2(1.4);
        let bad_spin = ObdmParams {
            spin: Some(2),
            ..Default::default()
        };
        assert!(matches!(
            ObdmAccumulator::new(&h2, DMatrix::identity(2, 2), bad_spin, &mut rng),
            Err(QmcError::InvalidArgument(_))
        ));
        assert!(ObdmAccumulator::new(&h2, DMatrix::identity(3, 3), ObdmParams::default(), &mut rng).is_err());

        for tstep in [-0.5, f64::NAN] {
            let params = ObdmParams {
                tstep,
                warmup: 0,
                ..Default::default()
            };
            assert!(matches!(
                ObdmAccumulator::new(&h2, DMatrix::identity(2, 2), params, &mut rng),
                Err(QmcError::InvalidArgument(_))
            ));
        }
        let mut points = vec![Vector3::zeros(); 3];
        assert!(sample_onebody(&h2, &DMatrix::identity(2, 2), &mut points, -1.0, &mut rng).is_err());
    }

    #[test]
    fn test_aux_pool_size() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = ObdmParams {
            naux: 50,
            warmup: 0,
            ..Default::default()
        };
        let obdm = ObdmAccumulator::new(&Molecule::h2(1.4), h2_orbitals(), params, &mut rng).unwrap();
        // (50 / 2 + 1) walkers × 2 electrons
        assert_eq!(obdm.aux().len(), 52);
        assert_eq!(obdm.norb(), 2);
    }

    #[test]
    fn test_sample_onebody_targets_orbital_density() {
        let mut rng = StdRng::seed_from_u64(2);
        let alpha = 0.5;
        let system = GaussianOrbital::new(alpha);
        let orb = DMatrix::from_element(1, 1, 1.0);
        let mut points = vec![Vector3::zeros(); 2000];
        for _ in 0..50 {
            sample_onebody(&system, &orb, &mut points, 1.0, &mut rng).unwrap();
        }
        let mut r2 = 0.0;
        let mut accepted = 0.0;
        let nsweep = 100;
        for _ in 0..nsweep {
            accepted += fraction(&sample_onebody(&system, &orb, &mut points, 1.0, &mut rng).unwrap());
            r2 += points.iter().map(|r| r.norm_squared()).sum::<f64>() / points.len() as f64;
        }
        // φ² = exp(-2α r²): variance 1/(4α) per axis
        assert_relative_eq!(r2 / nsweep as f64, 3.0 / (4.0 * alpha), max_relative = 0.05);
        let acceptance = accepted / nsweep as f64;
        assert!(acceptance > 0.0 && acceptance < 1.0);
    }

    #[test]
    fn test_one_orbital_one_electron_is_exact() {
        let mut rng = StdRng::seed_from_u64(3);
        let system = GaussianOrbital::new(0.7);
        let orb = DMatrix::from_element(1, 1, 1.0);
        let mut wf = SlaterDeterminant::new(GaussianOrbital::new(0.7), [orb.clone(), DMatrix::zeros(1, 0)]).unwrap();
        let configs = initial_guess(&system, 10, 0.5, &mut rng).unwrap();
        wf.recompute(&configs).unwrap();

        let params = ObdmParams {
            naux: 40,
            warmup: 5,
            ..Default::default()
        };
        let mut obdm = ObdmAccumulator::new(&system, orb, params, &mut rng).unwrap();
        let data = obdm.accumulate(&system, &configs, &wf, &mut rng).unwrap();
        for w in 0..10 {
            assert_relative_eq!(data["value"][w][(0, 0)], 1.0, epsilon = 1e-10);
            assert_relative_eq!(data["norm"][w][(0, 0)], 1.0, epsilon = 1e-10);
        }
        assert_eq!(data["acceptance"].len(), 10);
    }

    #[test]
    fn test_h2_bonding_occupation() {
        let mut rng = StdRng::seed_from_u64(4);
        let system = single_electron_h2();
        let orbitals = h2_orbitals();
        let bonding = orbitals.columns(0, 1).clone_owned();
        let mut wf = SlaterDeterminant::new(single_electron_h2(), [bonding, DMatrix::zeros(2, 0)]).unwrap();
        let configs = initial_guess(&system, 100, 1.0, &mut rng).unwrap();
        wf.recompute(&configs).unwrap();

        let params = ObdmParams {
            nstep: 20,
            naux: 400,
            warmup: 50,
            ..Default::default()
        };
        let mut obdm = ObdmAccumulator::new(&system, orbitals, params, &mut rng).unwrap();
        let mut value = DMatrix::zeros(2, 2);
        let mut norm = DMatrix::zeros(2, 1);
        let ncall = 10;
        for _ in 0..ncall {
            let avg = obdm.avg(&system, &configs, &wf, &mut rng).unwrap();
            value += &avg["value"];
            norm += &avg["norm"];
        }
        let rho = normalize_obdm(&(value / ncall as f64), &(norm / ncall as f64).column(0).into_owned());

        // ρ_00 and norm_0 average the same samples exactly.
        assert_relative_eq!(rho[(0, 0)], 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(rho[(1, 1)], 0.0, epsilon = 0.25);
        // Occupations lie in [0, 1]; ρ_11 sits at 0 up to sampling noise.
        for i in 0..2 {
            assert!(rho[(i, i)] >= -0.25, "rho{}{} = {}", i, i, rho[(i, i)]);
            assert!(rho[(i, i)] <= 1.0 + 1e-8, "rho{}{} = {}", i, i, rho[(i, i)]);
        }
    }

    #[test]
    fn test_normalize_obdm() {
        let obdm = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 0.5]);
        let norm = DVector::from_vec(vec![4.0, 1.0]);
        let rho = normalize_obdm(&obdm, &norm);
        assert_relative_eq!(rho[(0, 0)], 0.5);
        assert_relative_eq!(rho[(0, 1)], 0.5);
        assert_relative_eq!(rho[(1, 1)], 0.5);
    }
}
