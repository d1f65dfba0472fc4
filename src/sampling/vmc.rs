//! Variational Monte Carlo driver.
//!
//! Every step moves each electron in turn, in increasing index order, for all
//! walkers at once. The proposal is an isotropic Gaussian of width `tstep`
//! and a move is accepted when `|Ψ'/Ψ|²` exceeds a uniform draw. After the
//! electron sweep every accumulator is evaluated and reduced to a walker
//! average.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, Vector3};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::initial::gaussian;
use super::traits::Accumulator;
use crate::ensemble::Ensemble;
use crate::error::Result;
use crate::wavefunction::Wavefunction;

/// Parameters for a VMC run.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub struct VmcParams {
    /// Number of steps (electron sweeps)
    pub nsteps: usize,
    /// Standard deviation of the Gaussian proposal
    pub tstep: f64,
}

impl Default for VmcParams {
    fn default() -> Self {
        Self { nsteps: 100, tstep: 0.5 }
    }
}

/// Walker-averaged quantities of one step, keyed by accumulator name + sub-quantity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepAverages(BTreeMap<String, DMatrix<f64>>);

impl StepAverages {
    pub fn insert(&mut self, name: impl Into<String>, value: DMatrix<f64>) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&DMatrix<f64>> {
        self.0.get(name)
    }

    /// Value of a `1 × 1` entry.
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name).filter(|m| m.shape() == (1, 1)).map(|m| m[(0, 0)])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DMatrix<f64>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Mean over walkers of per-walker rows.
pub(crate) fn walker_mean(rows: &[DMatrix<f64>]) -> DMatrix<f64> {
    match rows.split_first() {
        None => DMatrix::zeros(0, 0),
        Some((first, rest)) => rest.iter().fold(first.clone(), |acc, m| acc + m) / rows.len() as f64,
    }
}

type NamedAccumulator<'a, S, W> = (String, Box<dyn Accumulator<S, W> + 'a>);

/// Metropolis sampler over an ensemble of independent walkers.
pub struct VmcSimulation<'a, S, W> {
    system: &'a S,
    params: VmcParams,
    accumulators: Vec<NamedAccumulator<'a, S, W>>,
}

impl<'a, S, W: Wavefunction> VmcSimulation<'a, S, W> {
    pub fn new(system: &'a S, params: VmcParams) -> Self {
        Self {
            system,
            params,
            accumulators: Vec::new(),
        }
    }

    /// Register an accumulator; its results are stored as `name + key`.
    pub fn with_accumulator(mut self, name: impl Into<String>, accumulator: impl Accumulator<S, W> + 'a) -> Self {
        self.add_accumulator(name, accumulator);
        self
    }

    pub fn add_accumulator(&mut self, name: impl Into<String>, accumulator: impl Accumulator<S, W> + 'a) {
        self.accumulators.push((name.into(), Box::new(accumulator)));
    }

    /// Run `nsteps` sweeps, mutating `configs` in place.
    ///
    /// Returns the walker-averaged results of each step in step order, always
    /// including `"acceptance"`. An ensemble without walkers or electrons
    /// yields an empty history.
    pub fn run<R: RngCore>(&mut self, wf: &mut W, configs: &mut Ensemble, rng: &mut R) -> Result<Vec<StepAverages>> {
        let normal = gaussian("tstep", self.params.tstep)?;
        if configs.is_empty() {
            warn!(
                nconfig = configs.nconfig(),
                nelec = configs.nelec(),
                "Nothing to sample, returning empty history"
            );
            return Ok(Vec::new());
        }

        let nconfig = configs.nconfig();
        let nelec = configs.nelec();
        info!(nconfig, nelec, nsteps = self.params.nsteps, tstep = self.params.tstep, "Starting VMC");
        wf.recompute(configs)?;

        let mut history = Vec::with_capacity(self.params.nsteps);
        for step in 0..self.params.nsteps {
            let mut acc = 0.0;
            for e in 0..nelec {
                let proposed: Vec<Vector3<f64>> = configs
                    .electron(e)
                    .iter()
                    .map(|r| r + Vector3::from_distribution(&normal, rng))
                    .collect();
                let ratio = wf.test_value(e, &proposed)?;
                let accept: Vec<bool> = ratio.iter().map(|q| q * q > rng.gen::<f64>()).collect();

                configs.commit(e, &proposed, &accept);
                wf.update_internals(e, &configs.electron(e), &accept)?;
                acc += accept.iter().filter(|&&a| a).count() as f64 / nconfig as f64;
            }

            let mut averages = StepAverages::default();
            for (name, accumulator) in self.accumulators.iter_mut() {
                let data = accumulator.accumulate(self.system, configs, wf, &mut *rng)?;
                for (key, rows) in data {
                    averages.insert(format!("{}{}", name, key), walker_mean(&rows));
                }
            }
            let acceptance = acc / nelec as f64;
            averages.insert("acceptance", DMatrix::from_element(1, 1, acceptance));
            debug!(step, acceptance, "VMC step");
            history.push(averages);
        }

        info!(nsteps = history.len(), "VMC finished");
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QmcError;
    use crate::sampling::traits::WalkerData;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Ψ = exp(-α Σ r²), a product of Gaussians.
    struct Gaussian {
        alpha: f64,
        configs: Ensemble,
    }

    impl Wavefunction for Gaussian {
        fn recompute(&mut self, configs: &Ensemble) -> Result<()> {
            self.configs = configs.clone();
            Ok(())
        }

        fn test_value(&self, e: usize, epos: &[Vector3<f64>]) -> Result<Vec<f64>> {
            Ok(epos
                .iter()
                .enumerate()
                .map(|(w, r)| {
                    let old = self.configs.walker(w)[e];
                    (-self.alpha * (r.norm_squared() - old.norm_squared())).exp()
                })
                .collect())
        }

        fn update_internals(&mut self, e: usize, epos: &[Vector3<f64>], accept: &[bool]) -> Result<()> {
            self.configs.commit(e, epos, accept);
            Ok(())
        }
    }

    struct Radius;

    impl<S, W> Accumulator<S, W> for Radius {
        fn accumulate(&mut self, _: &S, configs: &Ensemble, _: &W, _: &mut dyn RngCore) -> Result<WalkerData> {
            let r2 = configs
                .walkers()
                .iter()
                .map(|w| DMatrix::from_element(1, 1, w.iter().map(|r| r.norm_squared()).sum::<f64>()))
                .collect();
            Ok(WalkerData::from([("r2".to_string(), r2)]))
        }
    }

    fn gaussian() -> Gaussian {
        Gaussian {
            alpha: 0.5,
            configs: Ensemble::zeros(0, 0),
        }
    }

    #[test]
    fn test_named_results_and_sampled_moment() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut configs = Ensemble::zeros(200, 1);
        let mut wf = gaussian();
        let mut vmc = VmcSimulation::new(&(), VmcParams { nsteps: 400, tstep: 1.0 }).with_accumulator("radius", Radius);
        let history = vmc.run(&mut wf, &mut configs, &mut rng).unwrap();

        assert_eq!(history.len(), 400);
        let names: Vec<&str> = history[0].names().collect();
        assert_eq!(names, vec!["acceptance", "radiusr2"]);

        // |Ψ|² = exp(-r²) is a Gaussian with variance 1/2 per axis, <r²> = 3/2.
        let r2: f64 = history[100..].iter().filter_map(|s| s.scalar("radiusr2")).sum::<f64>() / 300.0;
        assert_relative_eq!(r2, 1.5, epsilon = 0.1);
    }

    #[test]
    fn test_acceptance_limits() {
        let run = |tstep: f64| {
            let mut rng = StdRng::seed_from_u64(11);
            let mut configs = Ensemble::zeros(100, 2);
            let mut wf = gaussian();
            let mut vmc = VmcSimulation::<(), Gaussian>::new(&(), VmcParams { nsteps: 20, tstep });
            let history = vmc.run(&mut wf, &mut configs, &mut rng).unwrap();
            history.iter().filter_map(|s| s.scalar("acceptance")).sum::<f64>() / history.len() as f64
        };
        assert!(run(1e-4) > 0.99);
        assert!(run(1e3) < 0.01);
    }

    #[test]
    fn test_same_seed_same_history() {
        let run = || {
            let mut rng = StdRng::seed_from_u64(21);
            let mut configs = Ensemble::zeros(5, 3);
            let mut wf = gaussian();
            let mut vmc = VmcSimulation::new(&(), VmcParams { nsteps: 10, tstep: 0.7 }).with_accumulator("radius", Radius);
            let history = vmc.run(&mut wf, &mut configs, &mut rng).unwrap();
            (history, configs)
        };
        let (h1, c1) = run();
        let (h2, c2) = run();
        assert_eq!(h1, h2);
        assert_eq!(c1.walkers(), c2.walkers());
    }

    #[test]
    fn test_empty_ensemble_is_noop() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut wf = gaussian();
        let mut vmc = VmcSimulation::<(), Gaussian>::new(&(), VmcParams::default());
        assert!(vmc.run(&mut wf, &mut Ensemble::zeros(0, 2), &mut rng).unwrap().is_empty());
        assert!(vmc.run(&mut wf, &mut Ensemble::zeros(3, 0), &mut rng).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_tstep_rejected() {
        for tstep in [-1.0, f64::NAN, f64::INFINITY] {
            let mut rng = StdRng::seed_from_u64(0);
            let mut wf = gaussian();
            let mut configs = Ensemble::zeros(2, 1);
            let mut vmc = VmcSimulation::<(), Gaussian>::new(&(), VmcParams { nsteps: 2, tstep });
            assert!(matches!(
                vmc.run(&mut wf, &mut configs, &mut rng),
                Err(QmcError::InvalidArgument(_))
            ));
            assert_eq!(configs, Ensemble::zeros(2, 1));
            // Rejected before the empty-ensemble shortcut.
            assert!(vmc.run(&mut wf, &mut Ensemble::zeros(0, 0), &mut rng).is_err());
        }
    }
}
