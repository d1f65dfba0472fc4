//! Distance module - displacement vectors between particle sets.
//!
//! Displacements are always `vec - config`, i.e. they point from the particles
//! in `configs` to the reference position. All arrays are walker-major:
//! `result[walker][particle]`.

mod periodic;

pub use periodic::{Lattice, MinimalImageDistance};

use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use crate::error::{QmcError, Result};

/// Packed displacements together with the `(i, j)` labels of each column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairList {
    /// `dist[walker][pair]`
    pub dist: Vec<Vec<Vector3<f64>>>,
    pub ij: Vec<(usize, usize)>,
}

impl PairList {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn npairs(&self) -> usize {
        self.ij.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ij.is_empty()
    }
}

/// Displacement geometry under some boundary condition.
pub trait Distance: Send + Sync {
    /// Displacements from every particle of each walker to that walker's `vec`.
    ///
    /// `configs` is `nconfig × m`, `vec` is `nconfig`; the result is `nconfig × m`.
    /// A `vec` of a different length is an `InvalidArgument`.
    fn dist_i(&self, configs: &[Vec<Vector3<f64>>], vec: &[Vector3<f64>]) -> Result<Vec<Vec<Vector3<f64>>>>;

    /// All pairwise displacements `r_i - r_j` within one particle set.
    ///
    /// Pairs are ordered `i = 0..n-1`, `j = i+1..n`, giving `n(n-1)/2` columns.
    /// Fewer than two particles yields an empty list.
    fn dist_matrix(&self, configs: &[Vec<Vector3<f64>>]) -> Result<PairList> {
        let n = configs.first().map_or(0, Vec::len);
        if n < 2 {
            return Ok(PairList::empty());
        }

        let npairs = n * (n - 1) / 2;
        let mut dist = vec![Vec::with_capacity(npairs); configs.len()];
        let mut ij = Vec::with_capacity(npairs);
        for i in 0..n - 1 {
            let rest: Vec<Vec<Vector3<f64>>> = configs.iter().map(|w| w[i + 1..].to_vec()).collect();
            let vec: Vec<Vector3<f64>> = configs.iter().map(|w| w[i]).collect();
            for (row, d) in dist.iter_mut().zip(self.dist_i(&rest, &vec)?) {
                row.extend(d);
            }
            ij.extend((i + 1..n).map(|j| (i, j)));
        }
        Ok(PairList { dist, ij })
    }

    /// Displacements from every particle of `config_a` to every particle of `config_b`.
    ///
    /// Columns run over particles of `b` (outer) and `a` (inner); each label is
    /// `(index in a, index in b)`. Either side empty yields an empty list.
    fn pairwise(&self, config_a: &[Vec<Vector3<f64>>], config_b: &[Vec<Vector3<f64>>]) -> Result<PairList> {
        let na = config_a.first().map_or(0, Vec::len);
        let nb = config_b.first().map_or(0, Vec::len);
        if na == 0 || nb == 0 {
            return Ok(PairList::empty());
        }

        let mut dist = vec![Vec::with_capacity(na * nb); config_a.len()];
        let mut ij = Vec::with_capacity(na * nb);
        for b in 0..nb {
            let vec: Vec<Vector3<f64>> = config_b.iter().map(|w| w[b]).collect();
            for (row, d) in dist.iter_mut().zip(self.dist_i(config_a, &vec)?) {
                row.extend(d);
            }
            ij.extend((0..na).map(|a| (a, b)));
        }
        Ok(PairList { dist, ij })
    }
}

/// Open boundary conditions: plain difference vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDistance;

impl Distance for RawDistance {
    fn dist_i(&self, configs: &[Vec<Vector3<f64>>], vec: &[Vector3<f64>]) -> Result<Vec<Vec<Vector3<f64>>>> {
        displace(configs, vec, |d| d)
    }
}

/// Pick the boundary condition once: open if `latvec` is `None`, periodic otherwise.
pub fn boundary(latvec: Option<Matrix3<f64>>) -> Result<Box<dyn Distance>> {
    Ok(match latvec {
        Some(latvec) => Box::new(MinimalImageDistance::new(latvec)?),
        None => Box::new(RawDistance),
    })
}

/// Apply `image` to every raw displacement `vec[w] - configs[w][k]`, in parallel over walkers.
pub(crate) fn displace<F>(
    configs: &[Vec<Vector3<f64>>],
    vec: &[Vector3<f64>],
    image: F,
) -> Result<Vec<Vec<Vector3<f64>>>>
where
    F: Fn(Vector3<f64>) -> Vector3<f64> + Sync,
{
    if configs.len() != vec.len() {
        return Err(QmcError::InvalidArgument(format!(
            "{} reference positions for {} walkers",
            vec.len(),
            configs.len()
        )));
    }
    Ok(configs
        .par_iter()
        .zip(vec.par_iter())
        .map(|(walker, v)| walker.iter().map(|r| image(v - r)).collect())
        .collect())
}
