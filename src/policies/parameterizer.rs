use core::ops::RangeInclusive;

use log::debug;

use super::r#trait::StratumRetentionPolicy;
use crate::errors::{HstratError, Result};

/// The property of a policy a [`Parameterizer`] measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyEvaluator {
    /// Column size ceiling after `at_num_strata_deposited` depositions.
    NumStrataRetainedUpperBound { at_num_strata_deposited: u64 },
    /// Absolute MRCA uncertainty bound for two columns of the given depth.
    /// `at_rank: None` measures at the pessimal MRCA rank.
    MrcaUncertaintyAbsUpperBound {
        at_num_strata_deposited: u64,
        at_rank: Option<u64>,
    },
    /// Relative MRCA uncertainty bound, as above.
    MrcaUncertaintyRelUpperBound {
        at_num_strata_deposited: u64,
        at_rank: Option<u64>,
    },
}

impl PolicyEvaluator {
    pub fn evaluate<P: StratumRetentionPolicy>(&self, policy: &P) -> f64 {
        match *self {
            Self::NumStrataRetainedUpperBound {
                at_num_strata_deposited: n,
            } => policy.calc_num_strata_retained_upper_bound(n) as f64,
            Self::MrcaUncertaintyAbsUpperBound {
                at_num_strata_deposited: n,
                at_rank: Some(rank),
            } => policy.calc_mrca_uncertainty_abs_upper_bound(rank, n, n) as f64,
            Self::MrcaUncertaintyAbsUpperBound {
                at_num_strata_deposited: n,
                at_rank: None,
            } => policy.calc_mrca_uncertainty_abs_upper_bound_at_pessimal_rank(n, n) as f64,
            Self::MrcaUncertaintyRelUpperBound {
                at_num_strata_deposited: n,
                at_rank: Some(rank),
            } => policy.calc_mrca_uncertainty_rel_upper_bound(rank, n, n),
            Self::MrcaUncertaintyRelUpperBound {
                at_num_strata_deposited: n,
                at_rank: None,
            } => policy.calc_mrca_uncertainty_rel_upper_bound_at_pessimal_rank(n, n),
        }
    }
}

/// How the evaluated property must relate to a target value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParameterizerGoal {
    AtMost(f64),
    AtLeast(f64),
    Exactly(f64),
}

impl ParameterizerGoal {
    fn target(self) -> f64 {
        match self {
            Self::AtMost(t) | Self::AtLeast(t) | Self::Exactly(t) => t,
        }
    }

    fn is_satisfied_by(self, value: f64) -> bool {
        match self {
            Self::AtMost(target) => value <= target,
            Self::AtLeast(target) => value >= target,
            Self::Exactly(target) => value == target,
        }
    }
}

/// Searches an integer parameter range for the policy whose evaluated
/// property satisfies a goal as tightly as possible.
///
/// Among satisfying parameters the one whose value lies closest to the target
/// wins; ties go to the smallest parameter. Parameters the factory rejects
/// are skipped.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameterizer {
    pub goal: ParameterizerGoal,
    pub evaluator: PolicyEvaluator,
    pub param_range: RangeInclusive<u64>,
}

impl Parameterizer {
    pub fn new(goal: ParameterizerGoal, evaluator: PolicyEvaluator, param_range: RangeInclusive<u64>) -> Self {
        Self {
            goal,
            evaluator,
            param_range,
        }
    }

    /// Returns the chosen parameter and the policy built from it.
    pub fn parameterize<P, F>(&self, factory: F) -> Result<(u64, P)>
    where
        P: StratumRetentionPolicy,
        F: Fn(u64) -> Result<P>,
    {
        let target = self.goal.target();
        let mut best: Option<(f64, u64, P)> = None;
        for param in self.param_range.clone() {
            let Ok(policy) = factory(param) else {
                continue;
            };
            let value = self.evaluator.evaluate(&policy);
            if !self.goal.is_satisfied_by(value) {
                continue;
            }
            let distance = (value - target).abs();
            if best.as_ref().map_or(true, |(d, _, _)| distance < *d) {
                best = Some((distance, param, policy));
            }
        }

        match best {
            Some((_, param, policy)) => {
                debug!(
                    "parameterized {} with {param} for {:?} {:?}",
                    policy.algo_identifier(),
                    self.evaluator,
                    self.goal
                );
                Ok((param, policy))
            }
            None => Err(HstratError::Unsatisfiable {
                lower: *self.param_range.start(),
                upper: *self.param_range.end(),
            }),
        }
    }
}
