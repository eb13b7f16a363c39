use rand::RngCore;
use serde_json::Value;

use super::*;
use crate::errors::{HstratError, Result};

/// A runtime-dispatched wrapper over all 11 stratum retention policy types.
///
/// `RetentionPolicy` is what columns hold by default and what records store:
/// the algorithm identifier picks the variant and the variant's fields are
/// its parameter spec. Each trait method delegates to the inner variant via a
/// `match` dispatch. Policies outside this family can still drive a column
/// through the generic [`StratumRetentionPolicy`] parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RetentionPolicy {
    FixedResolution(FixedResolutionPolicy),
    RecencyProportional(RecencyProportionalPolicy),
    CurbedRecencyProportional(CurbedRecencyProportionalPolicy),
    GeometricSeqNthRoot(GeometricSeqNthRootPolicy),
    GeometricSeqNthRootTapered(GeometricSeqNthRootTaperedPolicy),
    DepthProportional(DepthProportionalPolicy),
    DepthProportionalTapered(DepthProportionalTaperedPolicy),
    NominalResolution(NominalResolutionPolicy),
    PerfectResolution(PerfectResolutionPolicy),
    Pseudostochastic(PseudostochasticPolicy),
    Stochastic(StochasticPolicy),
}

/// Helper macro that dispatches a method call to the inner policy variant.
macro_rules! dispatch {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            RetentionPolicy::FixedResolution(p) => p.$method($($arg),*),
            RetentionPolicy::RecencyProportional(p) => p.$method($($arg),*),
            RetentionPolicy::CurbedRecencyProportional(p) => p.$method($($arg),*),
            RetentionPolicy::GeometricSeqNthRoot(p) => p.$method($($arg),*),
            RetentionPolicy::GeometricSeqNthRootTapered(p) => p.$method($($arg),*),
            RetentionPolicy::DepthProportional(p) => p.$method($($arg),*),
            RetentionPolicy::DepthProportionalTapered(p) => p.$method($($arg),*),
            RetentionPolicy::NominalResolution(p) => p.$method($($arg),*),
            RetentionPolicy::PerfectResolution(p) => p.$method($($arg),*),
            RetentionPolicy::Pseudostochastic(p) => p.$method($($arg),*),
            RetentionPolicy::Stochastic(p) => p.$method($($arg),*),
        }
    };
}

/// Every algorithm identifier this crate can reconstruct from records.
pub const ALGO_IDENTIFIERS: [&str; 11] = [
    "fixed_resolution_algo",
    "recency_proportional_resolution_algo",
    "recency_proportional_resolution_curbed_algo",
    "geom_seq_nth_root_algo",
    "geom_seq_nth_root_tapered_algo",
    "depth_proportional_resolution_algo",
    "depth_proportional_resolution_tapered_algo",
    "nominal_resolution_algo",
    "perfect_resolution_algo",
    "pseudostochastic_algo",
    "stochastic_algo",
];

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::PerfectResolution(PerfectResolutionPolicy::new())
    }
}

impl RetentionPolicy {
    /// Check the wrapped parameters, e.g. after deserialization.
    pub fn validate(&self) -> Result<()> {
        dispatch!(self, validate)
    }

    /// Parameter spec as a JSON object, field name to value.
    pub fn policy_spec(&self) -> Result<Value> {
        let spec = match self {
            Self::FixedResolution(p) => serde_json::to_value(p),
            Self::RecencyProportional(p) => serde_json::to_value(p),
            Self::CurbedRecencyProportional(p) => serde_json::to_value(p),
            Self::GeometricSeqNthRoot(p) => serde_json::to_value(p),
            Self::GeometricSeqNthRootTapered(p) => serde_json::to_value(p),
            Self::DepthProportional(p) => serde_json::to_value(p),
            Self::DepthProportionalTapered(p) => serde_json::to_value(p),
            Self::NominalResolution(p) => serde_json::to_value(p),
            Self::PerfectResolution(p) => serde_json::to_value(p),
            Self::Pseudostochastic(p) => serde_json::to_value(p),
            Self::Stochastic(p) => serde_json::to_value(p),
        };
        Ok(spec?)
    }

    /// Rebuild a policy from its algorithm identifier and parameter spec.
    pub fn from_algo_and_spec(algo: &str, spec: Value) -> Result<Self> {
        let policy = match algo {
            "fixed_resolution_algo" => Self::FixedResolution(serde_json::from_value(spec)?),
            "recency_proportional_resolution_algo" => {
                Self::RecencyProportional(serde_json::from_value(spec)?)
            }
            "recency_proportional_resolution_curbed_algo" => {
                Self::CurbedRecencyProportional(serde_json::from_value(spec)?)
            }
            "geom_seq_nth_root_algo" => Self::GeometricSeqNthRoot(serde_json::from_value(spec)?),
            "geom_seq_nth_root_tapered_algo" => {
                Self::GeometricSeqNthRootTapered(serde_json::from_value(spec)?)
            }
            "depth_proportional_resolution_algo" => {
                Self::DepthProportional(serde_json::from_value(spec)?)
            }
            "depth_proportional_resolution_tapered_algo" => {
                Self::DepthProportionalTapered(serde_json::from_value(spec)?)
            }
            "nominal_resolution_algo" => Self::NominalResolution(serde_json::from_value(spec)?),
            "perfect_resolution_algo" => Self::PerfectResolution(serde_json::from_value(spec)?),
            "pseudostochastic_algo" => Self::Pseudostochastic(serde_json::from_value(spec)?),
            "stochastic_algo" => Self::Stochastic(serde_json::from_value(spec)?),
            other => return Err(HstratError::UnknownPolicyAlgorithm(other.to_string())),
        };
        policy.validate()?;
        Ok(policy)
    }
}

impl StratumRetentionPolicy for RetentionPolicy {
    fn algo_identifier(&self) -> &'static str {
        dispatch!(self, algo_identifier)
    }

    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        dispatch!(self, iter_retained_ranks, num_strata_deposited)
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        dispatch!(self, calc_num_strata_retained_upper_bound, num_strata_deposited)
    }

    fn gen_drop_ranks(
        &self,
        num_strata_deposited: u64,
        retained_ranks: &[u64],
        rng: &mut dyn RngCore,
    ) -> Vec<u64> {
        dispatch!(self, gen_drop_ranks, num_strata_deposited, retained_ranks, rng)
    }

    fn calc_num_strata_retained_exact(&self, num_strata_deposited: u64) -> Option<u64> {
        dispatch!(self, calc_num_strata_retained_exact, num_strata_deposited)
    }

    fn calc_rank_at_column_index(&self, index: usize, num_strata_deposited: u64) -> Option<u64> {
        dispatch!(self, calc_rank_at_column_index, index, num_strata_deposited)
    }

    fn retained_ranks_at_depths(&self, depths: &[u64]) -> Option<Vec<Vec<u64>>> {
        dispatch!(self, retained_ranks_at_depths, depths)
    }

    fn calc_mrca_uncertainty_abs_upper_bound(
        &self,
        actual_rank_of_mrca: u64,
        num_strata_deposited_a: u64,
        num_strata_deposited_b: u64,
    ) -> u64 {
        dispatch!(
            self,
            calc_mrca_uncertainty_abs_upper_bound,
            actual_rank_of_mrca,
            num_strata_deposited_a,
            num_strata_deposited_b
        )
    }
}

macro_rules! impl_from_variant {
    ($($policy:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$policy> for RetentionPolicy {
                fn from(p: $policy) -> Self {
                    RetentionPolicy::$variant(p)
                }
            }
        )*
    };
}

impl_from_variant! {
    FixedResolutionPolicy => FixedResolution,
    RecencyProportionalPolicy => RecencyProportional,
    CurbedRecencyProportionalPolicy => CurbedRecencyProportional,
    GeometricSeqNthRootPolicy => GeometricSeqNthRoot,
    GeometricSeqNthRootTaperedPolicy => GeometricSeqNthRootTapered,
    DepthProportionalPolicy => DepthProportional,
    DepthProportionalTaperedPolicy => DepthProportionalTapered,
    NominalResolutionPolicy => NominalResolution,
    PerfectResolutionPolicy => PerfectResolution,
    PseudostochasticPolicy => Pseudostochastic,
    StochasticPolicy => Stochastic,
}
