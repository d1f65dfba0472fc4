//! Accumulators evaluated by the VMC driver after every step.

mod dipole;
mod obdm;

pub use dipole::DipoleAccumulator;
pub use obdm::{normalize_obdm, sample_onebody, ElectronSelection, ObdmAccumulator, ObdmParams};
