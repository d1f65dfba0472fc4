//! Electronic dipole: sum of electron positions per walker.

use nalgebra::{DMatrix, Vector3};
use rand::RngCore;

use crate::ensemble::Ensemble;
use crate::error::Result;
use crate::sampling::{Accumulator, WalkerData};

#[derive(Debug, Clone, Copy, Default)]
pub struct DipoleAccumulator;

impl<S, W> Accumulator<S, W> for DipoleAccumulator {
    fn accumulate(&mut self, _: &S, configs: &Ensemble, _: &W, _: &mut dyn RngCore) -> Result<WalkerData> {
        let vec = configs
            .walkers()
            .iter()
            .map(|walker| {
                let sum = walker.iter().fold(Vector3::zeros(), |acc, r| acc + r);
                DMatrix::from_column_slice(3, 1, sum.as_slice())
            })
            .collect();
        Ok(WalkerData::from([("vec".to_string(), vec)]))
    }
}
