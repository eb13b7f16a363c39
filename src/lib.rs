//! Hereditary stratigraphy: decentralized phylogenetic inference.
//!
//! Each organism carries a [`HereditaryStratigraphicColumn`] that gains one
//! random differentia per generation and sheds old ones under a
//! [`policies::StratumRetentionPolicy`]. Comparing two columns bounds the
//! generation of their most recent common ancestor; comparing a whole
//! population reconstructs its phylogeny.

pub mod column;
pub mod differentia;
pub mod errors;
pub mod policies;
pub mod reconstruction;
pub mod serialization;
pub mod simulation;
pub mod specimen;

pub use column::{HereditaryStratigraphicArtifact, HereditaryStratigraphicColumn, Stratum};
pub use differentia::Differentia;
pub use errors::{HstratError, Result};
pub use policies::{RetentionPolicy, StratumRetentionPolicy};
pub use specimen::{HereditaryStratigraphicAssemblage, HereditaryStratigraphicSpecimen};

/// Largest power of 2 less than or equal to `x`. Returns 0 for input 0.
#[inline]
pub fn bit_floor(x: u64) -> u64 {
    if x == 0 {
        0
    } else {
        1u64 << (63 - x.leading_zeros() as u64)
    }
}

/// Number of bits needed to represent `x`. Returns 0 for input 0.
#[inline]
pub fn bit_length(x: u64) -> u64 {
    u64::from(64 - x.leading_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_helpers() {
        assert_eq!(bit_floor(0), 0);
        assert_eq!(bit_floor(1), 1);
        assert_eq!(bit_floor(6), 4);
        assert_eq!(bit_floor(u64::MAX), 1 << 63);
        assert_eq!(bit_length(0), 0);
        assert_eq!(bit_length(1), 1);
        assert_eq!(bit_length(8), 4);
        assert_eq!(bit_length(u64::MAX), 64);
    }
}
