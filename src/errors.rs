use thiserror::Error;

/// Error types for the hstrat crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HstratError {
    /// Differentia bit width must be in 1..=64.
    #[error("invalid differentia bit width: {0} (must be 1..=64)")]
    InvalidBitWidth(u8),

    /// A policy parameter is invalid.
    #[error("invalid policy parameter '{param}': {value}")]
    InvalidPolicyParam { param: &'static str, value: String },

    /// Two artifacts with different differentia widths were combined.
    #[error("incompatible differentia bit widths: expected {expected}, got {actual}")]
    IncompatibleDifferentiaBitWidth { expected: u8, actual: u8 },

    /// Confidence levels must lie in `[0, 1)`.
    #[error("invalid confidence level {0} (must be in [0, 1))")]
    InvalidConfidenceLevel(f64),

    /// The operation requires at least one column or specimen.
    #[error("population is empty")]
    EmptyPopulation,

    /// No parameter value in the searched range met the requested bound.
    #[error("no parameter value in {lower}..={upper} satisfies the requested bound")]
    Unsatisfiable { lower: u64, upper: u64 },

    /// Reconstruction found several independent roots.
    #[error("population has {num_roots} independent roots; set force_common_ancestry to join them")]
    MultipleRoots { num_roots: usize },

    /// A policy record named an algorithm this crate does not know.
    #[error("unknown stratum retention policy algorithm '{0}'")]
    UnknownPolicyAlgorithm(String),

    /// A dstream record named an algorithm without a registered lookup.
    #[error("unknown dstream algorithm '{0}'")]
    UnknownDstreamAlgorithm(String),

    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Index out of bounds.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl From<serde_json::Error> for HstratError {
    fn from(err: serde_json::Error) -> Self {
        Self::DeserializationError(err.to_string())
    }
}

impl From<hex::FromHexError> for HstratError {
    fn from(err: hex::FromHexError) -> Self {
        Self::DeserializationError(err.to_string())
    }
}

pub type Result<T> = core::result::Result<T, HstratError>;

/// Validate a differentia bit width.
pub(crate) fn check_bit_width(bit_width: u8) -> Result<u8> {
    if (1..=64).contains(&bit_width) {
        Ok(bit_width)
    } else {
        Err(HstratError::InvalidBitWidth(bit_width))
    }
}

/// Validate a confidence level.
pub(crate) fn check_confidence_level(confidence_level: f64) -> Result<f64> {
    if (0.0..1.0).contains(&confidence_level) {
        Ok(confidence_level)
    } else {
        Err(HstratError::InvalidConfidenceLevel(confidence_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_width_bounds() {
        assert_eq!(check_bit_width(1), Ok(1));
        assert_eq!(check_bit_width(64), Ok(64));
        assert_eq!(check_bit_width(0), Err(HstratError::InvalidBitWidth(0)));
        assert_eq!(check_bit_width(65), Err(HstratError::InvalidBitWidth(65)));
    }

    #[test]
    fn confidence_level_bounds() {
        assert!(check_confidence_level(0.0).is_ok());
        assert!(check_confidence_level(0.99).is_ok());
        assert!(check_confidence_level(1.0).is_err());
        assert!(check_confidence_level(-0.1).is_err());
        assert!(check_confidence_level(f64::NAN).is_err());
    }

    #[test]
    fn display_messages() {
        let err = HstratError::MultipleRoots { num_roots: 3 };
        assert!(err.to_string().contains("3 independent roots"));
        let err = HstratError::InvalidPolicyParam {
            param: "resolution",
            value: "0".into(),
        };
        assert_eq!(err.to_string(), "invalid policy parameter 'resolution': 0");
    }

    #[test]
    fn json_errors_convert() {
        let err: HstratError = serde_json::from_str::<u64>("nope").unwrap_err().into();
        assert!(matches!(err, HstratError::DeserializationError(_)));
    }
}
