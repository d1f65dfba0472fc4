//! Systems module - molecular systems and their basis functions.

mod molecule;
mod traits;

pub use molecule::{Atom, Molecule, Shell};
pub use traits::MolecularSystem;
