use std::collections::BTreeMap;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::geometric_seq_nth_root::{calc_upper_bound, compute_retained_ranks, validate_params};
use super::r#trait::StratumRetentionPolicy;
use super::sorted_set_difference;
use crate::errors::Result;

/// Geometric sequence Nth root retention with tapered (gradual) purging.
///
/// Tracks the same target rank set as
/// [`GeometricSeqNthRootPolicy`](super::GeometricSeqNthRootPolicy), but each
/// deposit discards only the oldest stratum that has fallen out of the target,
/// plus as many more as needed to honor the size bound. Strata leave the
/// column one at a time instead of in bulk purges.
///
/// The retained set depends on the deposit history, so scrying it replays
/// every deposit; [`RetainedRanksMemo`] amortizes repeated queries.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeometricSeqNthRootTaperedPolicy {
    pub degree: u64,
    pub interspersal: u64,
}

impl Default for GeometricSeqNthRootTaperedPolicy {
    fn default() -> Self {
        Self {
            degree: 2,
            interspersal: 2,
        }
    }
}

impl GeometricSeqNthRootTaperedPolicy {
    pub fn new(degree: u64, interspersal: u64) -> Self {
        assert!(degree > 0, "degree must be positive");
        assert!(interspersal > 0, "interspersal must be positive");
        Self {
            degree,
            interspersal,
        }
    }

    pub fn try_new(degree: u64, interspersal: u64) -> Result<Self> {
        let policy = Self {
            degree,
            interspersal,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        validate_params(self.degree, self.interspersal)
    }

    /// Retained ranks after `num_strata_deposited` depositions, resuming from
    /// the nearest checkpoint in `memo`.
    pub fn retained_ranks_memoized(
        &self,
        num_strata_deposited: u64,
        memo: &mut RetainedRanksMemo,
    ) -> Vec<u64> {
        memo.get_or_replay(self.degree, self.interspersal, num_strata_deposited)
    }

    fn step_drop_ranks(&self, num_strata_deposited: u64, retained_ranks: &[u64]) -> Vec<u64> {
        let target = compute_retained_ranks(
            self.degree,
            self.interspersal,
            num_strata_deposited + 1,
        );
        let mut candidates = sorted_set_difference(retained_ranks, &target);
        let bound = calc_upper_bound(self.degree, self.interspersal, num_strata_deposited + 1);
        let excess = (retained_ranks.len() as u64).saturating_sub(bound);
        candidates.truncate(excess.max(1) as usize);
        candidates
    }

    fn replay(&self, from: u64, mut retained: Vec<u64>, to: u64) -> Vec<u64> {
        for rank in from..to {
            retained.push(rank);
            let dropped = self.step_drop_ranks(rank, &retained);
            if !dropped.is_empty() {
                retained = sorted_set_difference(&retained, &dropped);
            }
        }
        retained
    }
}

impl StratumRetentionPolicy for GeometricSeqNthRootTaperedPolicy {
    fn algo_identifier(&self) -> &'static str {
        "geom_seq_nth_root_tapered_algo"
    }

    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>> {
        let ranks = self.replay(0, Vec::new(), num_strata_deposited);
        Some(Box::new(ranks.into_iter()))
    }

    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64 {
        calc_upper_bound(self.degree, self.interspersal, num_strata_deposited)
    }

    fn gen_drop_ranks(
        &self,
        num_strata_deposited: u64,
        retained_ranks: &[u64],
        _: &mut dyn RngCore,
    ) -> Vec<u64> {
        self.step_drop_ranks(num_strata_deposited, retained_ranks)
    }

    fn retained_ranks_at_depths(&self, depths: &[u64]) -> Option<Vec<Vec<u64>>> {
        // shallowest first, so each replay resumes from a cached checkpoint
        let mut order: Vec<usize> = (0..depths.len()).collect();
        order.sort_by_key(|&i| depths[i]);
        let mut memo = RetainedRanksMemo::default();
        let mut out = vec![Vec::new(); depths.len()];
        for i in order {
            out[i] = self.retained_ranks_memoized(depths[i], &mut memo);
        }
        Some(out)
    }
}

/// Bounded cache of replayed tapered retention states, keyed by
/// `(degree, interspersal, num_strata_deposited)`.
///
/// Meant to live for one computation over many depths (e.g. scrying a whole
/// population's tips), then be dropped.
#[derive(Clone, Debug)]
pub struct RetainedRanksMemo {
    capacity: usize,
    checkpoints: BTreeMap<(u64, u64, u64), Vec<u64>>,
}

impl Default for RetainedRanksMemo {
    fn default() -> Self {
        Self::with_capacity(64)
    }
}

impl RetainedRanksMemo {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            checkpoints: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    fn get_or_replay(&mut self, degree: u64, interspersal: u64, num_strata_deposited: u64) -> Vec<u64> {
        let key = (degree, interspersal, num_strata_deposited);
        if let Some(ranks) = self.checkpoints.get(&key) {
            return ranks.clone();
        }

        let (from, start) = self
            .checkpoints
            .range((degree, interspersal, 0)..key)
            .next_back()
            .map(|(&(_, _, n), ranks)| (n, ranks.clone()))
            .unwrap_or((0, Vec::new()));
        let policy = GeometricSeqNthRootTaperedPolicy {
            degree,
            interspersal,
        };
        let ranks = policy.replay(from, start, num_strata_deposited);

        if self.checkpoints.len() >= self.capacity {
            self.checkpoints.pop_first();
        }
        self.checkpoints.insert(key, ranks.clone());
        ranks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::GeometricSeqNthRootPolicy;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn ranks(policy: &GeometricSeqNthRootTaperedPolicy, n: u64) -> Vec<u64> {
        policy.iter_retained_ranks(n).unwrap().collect()
    }

    #[test]
    fn test_endpoints_sorted_and_bounded() {
        let policy = GeometricSeqNthRootTaperedPolicy::new(2, 2);
        let mut retained = Vec::new();
        for n in 0..2000u64 {
            retained = policy.replay(n, retained, n + 1);
            let n = n + 1;
            assert_eq!(retained.first(), Some(&0));
            assert_eq!(retained.last(), Some(&(n - 1)));
            assert!(retained.windows(2).all(|w| w[0] < w[1]));
            assert!(retained.len() as u64 <= policy.calc_num_strata_retained_upper_bound(n));
        }
    }

    #[test]
    fn test_contains_target_set() {
        let tapered = GeometricSeqNthRootTaperedPolicy::new(3, 2);
        let plain = GeometricSeqNthRootPolicy::new(3, 2);
        for n in [1, 10, 100, 777, 1500] {
            let tapered = ranks(&tapered, n);
            for rank in plain.iter_retained_ranks(n).unwrap() {
                assert!(tapered.binary_search(&rank).is_ok(), "n={n} rank={rank}");
            }
        }
    }

    #[test]
    fn test_gen_drop_ranks_tracks_iter() {
        let policy = GeometricSeqNthRootTaperedPolicy::new(2, 1);
        let mut rng = SmallRng::seed_from_u64(0);
        let mut retained = vec![0u64];
        for n in 1..300 {
            retained.push(n);
            let dropped = policy.gen_drop_ranks(n, &retained, &mut rng);
            retained.retain(|r| !dropped.contains(r));
        }
        assert_eq!(retained, ranks(&policy, 300));
    }

    #[test]
    fn test_memo_resumes_and_agrees() {
        let policy = GeometricSeqNthRootTaperedPolicy::new(2, 2);
        let mut memo = RetainedRanksMemo::with_capacity(2);
        for n in [50, 400, 120, 900, 900] {
            assert_eq!(policy.retained_ranks_memoized(n, &mut memo), ranks(&policy, n));
        }
        assert_eq!(memo.len(), 2);
    }

    #[test]
    fn test_algo_identifier() {
        let policy = GeometricSeqNthRootTaperedPolicy::default();
        assert_eq!(policy.algo_identifier(), "geom_seq_nth_root_tapered_algo");
    }
}
