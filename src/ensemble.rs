//! Walker ensemble: `nconfig` independent replicas of the electron configuration.

use nalgebra::Vector3;

use crate::error::{QmcError, Result};

/// Collection of walkers, each holding the same number of electron positions.
///
/// Electrons `0..nelec[0]` of every walker belong to spin channel 0, the rest
/// to channel 1. The partition itself lives with the system description.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    walkers: Vec<Vec<Vector3<f64>>>,
}

impl Ensemble {
    /// Build an ensemble from explicit walker configurations.
    ///
    /// Every walker must carry the same number of electrons.
    pub fn new(walkers: Vec<Vec<Vector3<f64>>>) -> Result<Self> {
        let nelec = walkers.first().map_or(0, Vec::len);
        if let Some(w) = walkers.iter().position(|w| w.len() != nelec) {
            return Err(QmcError::InvalidArgument(format!(
                "walker {} holds {} electrons, walker 0 holds {}",
                w,
                walkers[w].len(),
                nelec
            )));
        }
        Ok(Self { walkers })
    }

    pub fn zeros(nconfig: usize, nelec: usize) -> Self {
        Self {
            walkers: vec![vec![Vector3::zeros(); nelec]; nconfig],
        }
    }

    pub fn nconfig(&self) -> usize {
        self.walkers.len()
    }

    pub fn nelec(&self) -> usize {
        self.walkers.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.nconfig() == 0 || self.nelec() == 0
    }

    pub fn walkers(&self) -> &[Vec<Vector3<f64>>] {
        &self.walkers
    }

    pub fn walker(&self, w: usize) -> &[Vector3<f64>] {
        &self.walkers[w]
    }

    pub fn walker_mut(&mut self, w: usize) -> &mut [Vector3<f64>] {
        &mut self.walkers[w]
    }

    /// Position of electron `e` in every walker.
    pub fn electron(&self, e: usize) -> Vec<Vector3<f64>> {
        self.walkers.iter().map(|w| w[e]).collect()
    }

    /// Overwrite electron `e` with `positions` in walkers where `accept` is set.
    pub fn commit(&mut self, e: usize, positions: &[Vector3<f64>], accept: &[bool]) {
        for ((walker, pos), &ok) in self.walkers.iter_mut().zip(positions).zip(accept) {
            if ok {
                walker[e] = *pos;
            }
        }
    }

    /// All positions of all walkers, walker-major.
    pub fn flatten(&self) -> Vec<Vector3<f64>> {
        self.walkers.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_only_touches_accepted_walkers() {
        let mut ensemble = Ensemble::zeros(3, 2);
        let moved = vec![Vector3::new(1.0, 0.0, 0.0); 3];
        ensemble.commit(1, &moved, &[true, false, true]);

        assert_eq!(ensemble.walker(0)[1], moved[0]);
        assert_eq!(ensemble.walker(1)[1], Vector3::zeros());
        assert_eq!(ensemble.walker(2)[1], moved[2]);
        assert_eq!(ensemble.walker(0)[0], Vector3::zeros());
    }

    #[test]
    fn test_empty_ensemble() {
        let ensemble = Ensemble::new(vec![]).unwrap();
        assert_eq!(ensemble.nconfig(), 0);
        assert_eq!(ensemble.nelec(), 0);
        assert!(ensemble.is_empty());
        assert!(ensemble.flatten().is_empty());
    }

    #[test]
    fn test_electron_column() {
        let walkers = vec![
            vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0)],
            vec![Vector3::new(2.0, 2.0, 2.0), Vector3::new(3.0, 3.0, 3.0)],
        ];
        let ensemble = Ensemble::new(walkers).unwrap();
        assert_eq!(
            ensemble.electron(1),
            vec![Vector3::new(1.0, 1.0, 1.0), Vector3::new(3.0, 3.0, 3.0)]
        );
    }

    #[test]
    fn test_ragged_walkers_rejected() {
        let walkers = vec![vec![Vector3::zeros(); 2], vec![Vector3::zeros(); 1]];
        assert!(matches!(Ensemble::new(walkers), Err(QmcError::InvalidArgument(_))));
    }
}
