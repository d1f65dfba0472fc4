//! Correlation module - Jastrow factors for electron-electron correlations.

mod jastrow;

pub use jastrow::{JastrowParams, PadeJastrow};
