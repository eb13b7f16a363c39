use serde::{Deserialize, Serialize};

use super::r#trait::StratumRetentionPolicy;
use crate::errors::Result;
use crate::{bit_floor, bit_length};

/// Retains strata with spacing proportional to recency.
///
/// More recent strata are spaced more closely together, while older strata
/// are spaced more widely. The `resolution` parameter controls how many
/// strata cover each power-of-two band of recency, so MRCA uncertainty at
/// recency `d` stays below `d / resolution`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecencyProportionalPolicy {
    pub resolution: u64,
}

impl RecencyProportionalPolicy {
    pub fn new(resolution: u64) -> Self {
        Self { resolution }
    }

    pub fn try_new(resolution: u64) -> Result<Self> {
        let policy = Self { resolution };
        policy.validate()?;
        Ok(policy)
    }

    /// Every resolution, including zero, is valid.
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Calculate the provided uncertainty for a given resolution and number of
/// completed depositions since the rank being considered.
fn calc_provided_uncertainty(resolution: u64, num_completed: u64) -> u64 {
    bit_floor(num_completed / (resolution + 1)).max(1)
}

/// Compute the set of retained ranks for the recency-proportional policy.
pub(crate) fn compute_retained_ranks(resolution: u64, num_strata_deposited: u64) -> Vec<u64> {
    if num_strata_deposited == 0 {
        return Vec::new();
    }
    let newest_rank = num_strata_deposited - 1;
    let mut retained = Vec::new();

    let mut rank = 0u64;
    loop {
        retained.push(rank);
        if rank == newest_rank {
            break;
        }
        let step = calc_provided_uncertainty(resolution, newest_rank - rank);
        rank += step;
        if rank > newest_rank {
            retained.push(newest_rank);
            break;
        }
    }

    retained
}

/// Column size ceiling for the recency-proportional ladder.
pub(crate) fn calc_upper_bound(resolution: u64, num_strata_deposited: u64) -> u64 {
    let bound = (resolution + 2).saturating_mul(bit_length(num_strata_deposited) + 1);
    num_strata_deposited.min(bound)
}

impl StratumRetentionPolicy for RecencyProportionalPolicy {
    fn algo_identifier(&self) -> &'static str {
        "recency_proportional_resolution_algo"
    }

    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        let ranks = compute_retained_ranks(self.resolution, num_strata_deposited);
        Some(Box::new(ranks.into_iter()))
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        calc_upper_bound(self.resolution, num_strata_deposited)
    }

    fn calc_rank_at_column_index(&self, index: usize, num_strata_deposited: u64) -> Option<u64> {
        compute_retained_ranks(self.resolution, num_strata_deposited)
            .get(index)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn ranks(policy: &RecencyProportionalPolicy, n: u64) -> Vec<u64> {
        policy.iter_retained_ranks(n).unwrap().collect()
    }

    #[test]
    fn test_zero_depositions() {
        let policy = RecencyProportionalPolicy::new(2);
        assert_eq!(policy.calc_num_strata_retained_exact(0), Some(0));
        assert!(ranks(&policy, 0).is_empty());
    }

    #[test]
    fn test_one_deposition() {
        let policy = RecencyProportionalPolicy::new(2);
        assert_eq!(policy.calc_num_strata_retained_exact(1), Some(1));
        assert_eq!(ranks(&policy, 1), vec![0]);
    }

    #[test]
    fn test_ranks_include_endpoints_and_fit_bound() {
        for resolution in [0, 1, 2, 5] {
            let policy = RecencyProportionalPolicy::new(resolution);
            for n in 1..2000 {
                let ranks = ranks(&policy, n);
                assert_eq!(ranks.first(), Some(&0), "should start at 0 for n={n}");
                assert_eq!(ranks.last(), Some(&(n - 1)), "should end at newest for n={n}");
                assert!(ranks.windows(2).all(|w| w[0] < w[1]), "unsorted at n={n}");
                assert!(ranks.len() as u64 <= policy.calc_num_strata_retained_upper_bound(n));
            }
        }
    }

    #[test]
    fn test_gen_drop_ranks_tracks_iter() {
        let policy = RecencyProportionalPolicy::new(2);
        let mut rng = SmallRng::seed_from_u64(0);
        let mut retained = vec![0u64];
        for n in 1..1000 {
            retained.push(n);
            let dropped = policy.gen_drop_ranks(n, &retained, &mut rng);
            retained.retain(|r| !dropped.contains(r));
            assert_eq!(retained, ranks(&policy, n + 1), "diverged at n={n}");
        }
    }

    #[test]
    fn test_calc_rank_at_column_index() {
        let policy = RecencyProportionalPolicy::new(2);
        for (i, &r) in ranks(&policy, 100).iter().enumerate() {
            assert_eq!(policy.calc_rank_at_column_index(i, 100), Some(r));
        }
    }

    #[test]
    fn test_uncertainty_proportional_to_recency() {
        let resolution = 4;
        let policy = RecencyProportionalPolicy::new(resolution);
        let n = 1000;
        for mrca in (0..n - 1).step_by(37) {
            let recency = n - 1 - mrca;
            let bound = policy.calc_mrca_uncertainty_abs_upper_bound(mrca, n, n);
            assert!(bound <= recency / resolution + 1, "mrca={mrca} bound={bound}");
        }
    }

    #[test]
    fn test_algo_identifier() {
        let policy = RecencyProportionalPolicy::new(2);
        assert_eq!(policy.algo_identifier(), "recency_proportional_resolution_algo");
    }

    #[test]
    fn test_calc_provided_uncertainty() {
        assert_eq!(calc_provided_uncertainty(2, 0), 1);
        assert_eq!(calc_provided_uncertainty(2, 3), 1);
        assert_eq!(calc_provided_uncertainty(2, 6), 2);
        assert_eq!(calc_provided_uncertainty(2, 12), 4);
    }
}
