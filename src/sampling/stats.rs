//! Post-processing of the per-step averages produced by the VMC driver.

use nalgebra::DMatrix;

use super::vmc::StepAverages;

/// Mean of a correlated time series with its blocked error bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub mean: f64,
    pub error: f64,
    pub autocorrelation_time: f64,
}

/// Estimate mean, integrated autocorrelation time and blocked error of `series`.
///
/// Returns `None` for an empty series.
pub fn estimate(series: &[f64]) -> Option<Estimate> {
    if series.is_empty() {
        return None;
    }
    let mean = series.iter().sum::<f64>() / series.len() as f64;
    let autocorrelation_time = autocorrelation_time(series);
    let error = blocked_error(series, autocorrelation_time);
    Some(Estimate {
        mean,
        error,
        autocorrelation_time,
    })
}

/// Integrated autocorrelation time, summed until the first negative lag.
pub fn autocorrelation_time(series: &[f64]) -> f64 {
    let n = series.len();
    if n == 0 {
        return 1.0;
    }
    let mean = series.iter().sum::<f64>() / n as f64;
    let var = series.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    if var == 0.0 {
        return 1.0;
    }

    let mut tau = 1.0;
    for t in 1..n / 2 {
        let auto_t = series[..n - t]
            .iter()
            .zip(&series[t..])
            .map(|(&x, &y)| (x - mean) * (y - mean))
            .sum::<f64>()
            / ((n - t) as f64 * var);
        if auto_t < 0.0 {
            break;
        }
        tau += 2.0 * auto_t;
    }
    tau
}

/// Standard error from block means with blocks of `ceil(2τ)` samples.
///
/// Fewer than two blocks give zero.
pub fn blocked_error(series: &[f64], autocorrelation_time: f64) -> f64 {
    let block_size = ((2.0 * autocorrelation_time).ceil() as usize).max(1);
    let n_blocks = series.len() / block_size;
    if n_blocks < 2 {
        return 0.0;
    }

    let block_means: Vec<f64> = series
        .chunks_exact(block_size)
        .map(|block| block.iter().sum::<f64>() / block_size as f64)
        .collect();
    let mean = block_means.iter().sum::<f64>() / n_blocks as f64;
    let variance = block_means.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n_blocks - 1) as f64;
    (variance / n_blocks as f64).sqrt()
}

/// Time series of the scalar `name` after discarding `warmup` steps.
pub fn scalar_series(history: &[StepAverages], name: &str, warmup: usize) -> Vec<f64> {
    history.iter().skip(warmup).filter_map(|step| step.scalar(name)).collect()
}

/// Elementwise average of the entry `name` over the steps after `warmup`.
pub fn average_matrix(history: &[StepAverages], name: &str, warmup: usize) -> Option<DMatrix<f64>> {
    let mut entries = history.iter().skip(warmup).filter_map(|step| step.get(name));
    let first = entries.next()?.clone();
    let (sum, count) = entries.fold((first, 1usize), |(acc, n), m| (acc + m, n + 1));
    Some(sum / count as f64)
}
