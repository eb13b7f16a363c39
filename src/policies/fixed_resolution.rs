use serde::{Deserialize, Serialize};

use super::r#trait::StratumRetentionPolicy;
use crate::errors::{HstratError, Result};

/// Retains strata at fixed rank intervals.
///
/// Keeps every `resolution`-th rank (0, resolution, 2*resolution, ...)
/// plus the newest rank. Provides constant absolute MRCA uncertainty
/// below `resolution`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedResolutionPolicy {
    pub resolution: u64,
}

impl FixedResolutionPolicy {
    pub fn new(resolution: u64) -> Self {
        assert!(resolution > 0, "resolution must be positive");
        Self { resolution }
    }

    pub fn try_new(resolution: u64) -> Result<Self> {
        let policy = Self { resolution };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(HstratError::InvalidPolicyParam {
                param: "resolution",
                value: self.resolution.to_string(),
            });
        }
        Ok(())
    }

    fn num_aligned(&self, num_strata_deposited: u64) -> u64 {
        num_strata_deposited.div_ceil(self.resolution)
    }
}

impl StratumRetentionPolicy for FixedResolutionPolicy {
    fn algo_identifier(&self) -> &'static str {
        "fixed_resolution_algo"
    }

    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        if num_strata_deposited == 0 {
            return Some(Box::new(core::iter::empty()));
        }
        let newest_rank = num_strata_deposited - 1;
        let aligned_iter = (0..=newest_rank).step_by(self.resolution as usize);
        let needs_extra = !newest_rank.is_multiple_of(self.resolution);
        Some(Box::new(
            aligned_iter.chain(needs_extra.then_some(newest_rank)),
        ))
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        (self.num_aligned(num_strata_deposited) + 1).min(num_strata_deposited)
    }

    fn calc_num_strata_retained_exact(&self, num_strata_deposited: u64) -> Option<u64> {
        if num_strata_deposited == 0 {
            return Some(0);
        }
        let newest_rank = num_strata_deposited - 1;
        let extra = u64::from(!newest_rank.is_multiple_of(self.resolution));
        Some(self.num_aligned(num_strata_deposited) + extra)
    }

    fn calc_rank_at_column_index(&self, index: usize, num_strata_deposited: u64) -> Option<u64> {
        let index = index as u64;
        let num_aligned = self.num_aligned(num_strata_deposited);
        if index < num_aligned {
            Some(index * self.resolution)
        } else if index < self.calc_num_strata_retained_exact(num_strata_deposited)? {
            Some(num_strata_deposited - 1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn ranks(policy: &FixedResolutionPolicy, n: u64) -> Vec<u64> {
        policy.iter_retained_ranks(n).unwrap().collect()
    }

    #[test]
    fn test_zero_depositions() {
        let policy = FixedResolutionPolicy::new(10);
        assert_eq!(policy.calc_num_strata_retained_exact(0), Some(0));
        assert!(ranks(&policy, 0).is_empty());
    }

    #[test]
    fn test_one_deposition() {
        let policy = FixedResolutionPolicy::new(10);
        assert_eq!(policy.calc_num_strata_retained_exact(1), Some(1));
        assert_eq!(ranks(&policy, 1), vec![0]);
    }

    #[test]
    fn test_aligned_depositions() {
        let policy = FixedResolutionPolicy::new(5);
        assert_eq!(policy.calc_num_strata_retained_exact(11), Some(3));
        assert_eq!(ranks(&policy, 11), vec![0, 5, 10]);
    }

    #[test]
    fn test_unaligned_depositions() {
        let policy = FixedResolutionPolicy::new(5);
        assert_eq!(policy.calc_num_strata_retained_exact(8), Some(3));
        assert_eq!(ranks(&policy, 8), vec![0, 5, 7]);
    }

    #[test]
    fn test_resolution_one() {
        let policy = FixedResolutionPolicy::new(1);
        assert_eq!(ranks(&policy, 5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_thousand_depositions_resolution_three() {
        let policy = FixedResolutionPolicy::new(3);
        let retained = ranks(&policy, 1000);
        assert_eq!(retained, (0..1000).step_by(3).collect::<Vec<_>>());
        assert!(retained.len() as u64 <= 1000u64.div_ceil(3) + 2);
        assert!(retained.len() as u64 <= policy.calc_num_strata_retained_upper_bound(1000));
    }

    #[test]
    fn test_gen_drop_ranks() {
        let policy = FixedResolutionPolicy::new(5);
        let mut rng = SmallRng::seed_from_u64(0);
        // depositing rank 8 over retained 0, 5, 7
        assert_eq!(policy.gen_drop_ranks(8, &[0, 5, 7, 8], &mut rng), vec![7]);
        // rank 10 is aligned, so the stale newest goes
        assert_eq!(policy.gen_drop_ranks(10, &[0, 5, 9, 10], &mut rng), vec![9]);
    }

    #[test]
    fn test_calc_rank_at_column_index() {
        let policy = FixedResolutionPolicy::new(5);
        for n in 0..60 {
            let expected = ranks(&policy, n);
            for (index, &rank) in expected.iter().enumerate() {
                assert_eq!(policy.calc_rank_at_column_index(index, n), Some(rank));
            }
            assert_eq!(policy.calc_rank_at_column_index(expected.len(), n), None);
        }
    }

    #[test]
    fn test_mrca_uncertainty_below_resolution() {
        let policy = FixedResolutionPolicy::new(10);
        for mrca in 0..99 {
            assert!(policy.calc_mrca_uncertainty_abs_upper_bound(mrca, 100, 120) < 10);
        }
    }

    #[test]
    fn test_invalid_resolution() {
        assert!(FixedResolutionPolicy::try_new(0).is_err());
        assert!(FixedResolutionPolicy::try_new(4).is_ok());
    }

    #[test]
    fn test_num_retained_equals_iter_count() {
        let policy = FixedResolutionPolicy::new(7);
        for n in 0..100 {
            let count = policy.calc_num_strata_retained_exact(n).unwrap();
            assert_eq!(count, ranks(&policy, n).len() as u64, "mismatch at n={n}");
            assert!(count <= policy.calc_num_strata_retained_upper_bound(n));
        }
    }
}
