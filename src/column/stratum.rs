use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::differentia::Differentia;

/// Opaque user payload carried by a stratum.
pub type Annotation = serde_json::Value;

/// A single stratum: a rank paired with a random differentia fingerprint.
///
/// Annotations ride along through cloning and serialization but never take
/// part in comparisons between columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stratum {
    pub rank: u64,
    pub differentia: Differentia,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
}

impl Stratum {
    pub fn new(rank: u64, differentia: Differentia) -> Self {
        Self {
            rank,
            differentia,
            annotation: None,
        }
    }

    pub fn with_annotation(rank: u64, differentia: Differentia, annotation: Annotation) -> Self {
        Self {
            rank,
            differentia,
            annotation: Some(annotation),
        }
    }

    /// A stratum at `rank` with a freshly drawn differentia.
    pub fn sample<R: Rng + ?Sized>(rank: u64, differentia_bit_width: u8, rng: &mut R) -> Self {
        Self::new(rank, Differentia::sample(differentia_bit_width, rng))
    }
}
