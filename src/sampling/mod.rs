//! Sampling module - initial configurations, the VMC driver and run statistics.

mod initial;
pub mod stats;
mod traits;
mod vmc;

pub use initial::{initial_guess, initial_guess_vectorized, DEFAULT_SPREAD};
pub use traits::{Accumulator, WalkerData};
pub use vmc::{StepAverages, VmcParams, VmcSimulation};
pub(crate) use initial::{check_width, gaussian};
pub(crate) use vmc::walker_mean;
