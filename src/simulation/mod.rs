//! Grow columns down a known phylogeny, for testing reconstruction against
//! ground truth.

mod descend;
mod template;

pub use descend::{descend_template_phylogeny, DescendMode};
pub use template::{TemplatePhylogeny, TemplateTree};
