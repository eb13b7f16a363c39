pub mod curbed_recency_proportional;
pub mod depth_proportional;
pub mod depth_proportional_tapered;
pub mod fixed_resolution;
pub mod geometric_seq_nth_root;
pub mod geometric_seq_nth_root_tapered;
pub mod nominal_resolution;
pub mod parameterizer;
pub mod perfect_resolution;
pub mod pseudostochastic;
pub mod recency_proportional;
pub mod retention_policy;
pub mod stochastic;
mod r#trait;

/// Compute `lhs \ rhs` for sorted ascending unique rank slices.
pub(crate) fn sorted_set_difference(lhs: &[u64], rhs: &[u64]) -> Vec<u64> {
    let mut out = Vec::new();
    let mut i = 0usize;
    let mut j = 0usize;

    while i < lhs.len() && j < rhs.len() {
        match lhs[i].cmp(&rhs[j]) {
            core::cmp::Ordering::Less => {
                out.push(lhs[i]);
                i += 1;
            }
            core::cmp::Ordering::Equal => {
                i += 1;
                j += 1;
            }
            core::cmp::Ordering::Greater => {
                j += 1;
            }
        }
    }

    out.extend_from_slice(&lhs[i..]);
    out
}

pub use curbed_recency_proportional::CurbedRecencyProportionalPolicy;
pub use depth_proportional::DepthProportionalPolicy;
pub use depth_proportional_tapered::DepthProportionalTaperedPolicy;
pub use fixed_resolution::FixedResolutionPolicy;
pub use geometric_seq_nth_root::GeometricSeqNthRootPolicy;
pub use geometric_seq_nth_root_tapered::{GeometricSeqNthRootTaperedPolicy, RetainedRanksMemo};
pub use nominal_resolution::NominalResolutionPolicy;
pub use parameterizer::{Parameterizer, ParameterizerGoal, PolicyEvaluator};
pub use perfect_resolution::PerfectResolutionPolicy;
pub use pseudostochastic::PseudostochasticPolicy;
pub use r#trait::StratumRetentionPolicy;
pub use recency_proportional::RecencyProportionalPolicy;
pub use retention_policy::{RetentionPolicy, ALGO_IDENTIFIERS};
pub use stochastic::StochasticPolicy;
