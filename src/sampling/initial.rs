//! Initial walker configurations.
//!
//! Electrons are placed on atoms in proportion to nuclear charge and then
//! smeared by an isotropic Gaussian of width `r`. Per spin channel each atom
//! first receives `floor(count × weight)` electrons; the leftovers are
//! distributed at random according to the fractional remainders.

use nalgebra::Vector3;
use rand::seq::index::sample_weighted;
use rand::Rng;
use rand_distr::Normal;

use crate::ensemble::Ensemble;
use crate::error::{QmcError, Result};
use crate::systems::MolecularSystem;

/// Default Gaussian spread around the assigned atom.
pub const DEFAULT_SPREAD: f64 = 1.0;

fn charge_weights<S: MolecularSystem>(system: &S) -> Result<Vec<f64>> {
    let charges = system.atom_charges();
    let total: f64 = charges.iter().sum();
    if charges.is_empty() || total <= 0.0 || charges.iter().any(|&q| q < 0.0) {
        return Err(QmcError::InvalidArgument(format!(
            "atom charges {:?} cannot be used as assignment weights",
            charges
        )));
    }
    Ok(charges.iter().map(|q| q / total).collect())
}

/// Deterministic core assignment for `count` electrons.
///
/// Returns `(neach, nleft, totleft)`: whole electrons per atom, fractional
/// remainder per atom and the number of electrons still unassigned.
fn split(count: usize, wts: &[f64]) -> (Vec<usize>, Vec<f64>, usize) {
    let exact: Vec<f64> = wts.iter().map(|w| count as f64 * w).collect();
    let neach: Vec<usize> = exact.iter().map(|x| x.floor() as usize).collect();
    let nleft = exact.iter().zip(&neach).map(|(x, &n)| x - n as f64).collect();
    let totleft = count.saturating_sub(neach.iter().sum());
    (neach, nleft, totleft)
}

/// Reject a step or spread that is negative or not finite.
pub(crate) fn check_width(label: &str, x: f64) -> Result<()> {
    if x.is_finite() && x >= 0.0 {
        Ok(())
    } else {
        Err(QmcError::InvalidArgument(format!(
            "{} must be finite and non-negative, got {}",
            label, x
        )))
    }
}

/// Zero-mean isotropic Gaussian of standard deviation `sigma`.
pub(crate) fn gaussian(label: &str, sigma: f64) -> Result<Normal<f64>> {
    check_width(label, sigma)?;
    Normal::new(0.0, sigma).map_err(|e| QmcError::InvalidArgument(format!("{} {}: {}", label, sigma, e)))
}

/// Walker-by-walker assignment; leftovers drawn without replacement.
pub fn initial_guess<S, R>(system: &S, nconfig: usize, r: f64, rng: &mut R) -> Result<Ensemble>
where
    S: MolecularSystem,
    R: Rng + ?Sized,
{
    let normal = gaussian("spread", r)?;
    let wts = charge_weights(system)?;
    let coords = system.atom_coords();
    let nelec = system.nelec();

    let mut walkers = Vec::with_capacity(nconfig);
    for _ in 0..nconfig {
        let mut epos = Vec::with_capacity(system.total_electrons());
        for count in nelec {
            let (mut neach, nleft, totleft) = split(count, &wts);
            if totleft > 0 {
                let gets = sample_weighted(rng, wts.len(), |k| nleft[k], totleft)
                    .map_err(|e| QmcError::Sampling(e.to_string()))?;
                for k in gets.iter() {
                    neach[k] += 1;
                }
            }
            for (coord, &n) in coords.iter().zip(&neach) {
                for _ in 0..n {
                    epos.push(coord + Vector3::from_distribution(&normal, rng));
                }
            }
        }
        walkers.push(epos);
    }
    Ensemble::new(walkers)
}

/// Batched assignment: the core split is shared by every walker and all
/// leftovers are drawn at once by inverting the cumulative remainder.
///
/// Leftovers are drawn with replacement, so an atom can receive more than
/// one extra electron in a given walker.
pub fn initial_guess_vectorized<S, R>(system: &S, nconfig: usize, r: f64, rng: &mut R) -> Result<Ensemble>
where
    S: MolecularSystem,
    R: Rng + ?Sized,
{
    let normal = gaussian("spread", r)?;
    let wts = charge_weights(system)?;
    let coords = system.atom_coords();
    let nelec = system.nelec();
    let mut configs = Ensemble::zeros(nconfig, system.total_electrons());

    for (s, &count) in nelec.iter().enumerate() {
        let (neach, nleft, totleft) = split(count, &wts);
        let core: Vec<Vector3<f64>> = coords
            .iter()
            .zip(&neach)
            .flat_map(|(coord, &n)| std::iter::repeat(*coord).take(n))
            .collect();
        let bins: Vec<f64> = nleft
            .iter()
            .scan(0.0, |acc, x| {
                *acc += x;
                Some(*acc / totleft as f64)
            })
            .collect();

        let ind0 = s * nelec[0];
        for w in 0..nconfig {
            let walker = configs.walker_mut(w);
            walker[ind0..ind0 + core.len()].copy_from_slice(&core);
            for slot in 0..totleft {
                let u: f64 = rng.gen();
                let k = bins.partition_point(|&b| b <= u).min(coords.len() - 1);
                walker[ind0 + core.len() + slot] = coords[k];
            }
        }
    }

    for w in 0..nconfig {
        for pos in configs.walker_mut(w).iter_mut() {
            *pos += Vector3::from_distribution(&normal, rng);
        }
    }
    Ok(configs)
}
