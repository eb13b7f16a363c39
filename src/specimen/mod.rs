//! Immutable snapshots of columns and rank-aligned populations of them.

mod assemblage;
#[allow(clippy::module_inception)]
mod specimen;

pub use assemblage::{AssemblageRow, HereditaryStratigraphicAssemblage};
pub use specimen::{col_to_specimen, pop_to_specimens, HereditaryStratigraphicSpecimen};
