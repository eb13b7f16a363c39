use core::fmt::Debug;

use rand::RngCore;

use super::sorted_set_difference;

/// Trait for stratum retention policies.
///
/// A retention policy determines which strata (historical checkpoints) are
/// kept or discarded as new generations are deposited. Different policies
/// offer different trade-offs between memory usage and MRCA inference accuracy.
///
/// Policies whose retained set is a pure function of the deposit count
/// implement [`iter_retained_ranks`](Self::iter_retained_ranks); every other
/// scryer has a default derived from it. Genuinely random policies return
/// `None` there and only guarantee an upper bound on column size.
pub trait StratumRetentionPolicy: Clone + Debug + PartialEq + Send + Sync {
    /// Algorithm identifier string used in records.
    fn algo_identifier(&self) -> &'static str;

    /// Ranks retained after `num_strata_deposited` depositions, ascending.
    ///
    /// Always includes rank 0 and `num_strata_deposited - 1` when
    /// `num_strata_deposited >= 1`.
    fn iter_retained_ranks(
        &self,
        num_strata_deposited: u64,
    ) -> Option<Box<dyn Iterator<Item = u64> + '_>>;

    /// Guaranteed ceiling on column size after `num_strata_deposited`
    /// depositions.
    fn calc_num_strata_retained_upper_bound(&self, num_strata_deposited: u64) -> u64;

    /// Ranks to purge while depositing the stratum at rank
    /// `num_strata_deposited`.
    ///
    /// `retained_ranks` already contains the incoming rank. The returned
    /// ranks are ascending and a subset of `retained_ranks`.
    fn gen_drop_ranks(
        &self,
        num_strata_deposited: u64,
        retained_ranks: &[u64],
        rng: &mut dyn RngCore,
    ) -> Vec<u64> {
        let _ = rng;
        match self.iter_retained_ranks(num_strata_deposited + 1) {
            Some(keep) => {
                let keep: Vec<u64> = keep.collect();
                sorted_set_difference(retained_ranks, &keep)
            }
            None => Vec::new(),
        }
    }

    /// Retained ranks at each of `depths`, in query order.
    ///
    /// Returns `None` for policies without a deterministic retained set.
    fn retained_ranks_at_depths(&self, depths: &[u64]) -> Option<Vec<Vec<u64>>> {
        depths
            .iter()
            .map(|&n| self.iter_retained_ranks(n).map(|ranks| ranks.collect()))
            .collect()
    }

    /// Exact column size after `num_strata_deposited` depositions, if known.
    fn calc_num_strata_retained_exact(&self, num_strata_deposited: u64) -> Option<u64> {
        self.iter_retained_ranks(num_strata_deposited)
            .map(|ranks| ranks.count() as u64)
    }

    /// The rank stored at `index` after `num_strata_deposited` depositions.
    ///
    /// A store may omit per-stratum ranks when this returns `Some`.
    fn calc_rank_at_column_index(&self, index: usize, num_strata_deposited: u64) -> Option<u64> {
        self.iter_retained_ranks(num_strata_deposited)?.nth(index)
    }

    /// Worst-case width of the open interval of ranks that may contain the
    /// MRCA, for two columns whose true MRCA sits at `actual_rank_of_mrca`.
    fn calc_mrca_uncertainty_abs_upper_bound(
        &self,
        actual_rank_of_mrca: u64,
        num_strata_deposited_a: u64,
        num_strata_deposited_b: u64,
    ) -> u64 {
        let common = common_retained_ranks(self, num_strata_deposited_a, num_strata_deposited_b);
        let newest = num_strata_deposited_a.min(num_strata_deposited_b);
        if newest == 0 {
            return 0;
        }
        let (lb, ub) = enclosing_gap(&common, actual_rank_of_mrca.min(newest - 1), newest);
        ub - lb - 1
    }

    /// Absolute uncertainty bound divided by the ranks elapsed since the MRCA.
    fn calc_mrca_uncertainty_rel_upper_bound(
        &self,
        actual_rank_of_mrca: u64,
        num_strata_deposited_a: u64,
        num_strata_deposited_b: u64,
    ) -> f64 {
        let newest = num_strata_deposited_a.min(num_strata_deposited_b);
        if newest == 0 {
            return 0.0;
        }
        let mrca = actual_rank_of_mrca.min(newest - 1);
        let abs = self.calc_mrca_uncertainty_abs_upper_bound(
            mrca,
            num_strata_deposited_a,
            num_strata_deposited_b,
        );
        abs as f64 / (newest - mrca) as f64
    }

    /// MRCA rank at which the absolute uncertainty bound is largest.
    fn calc_mrca_uncertainty_abs_upper_bound_pessimal_rank(
        &self,
        num_strata_deposited_a: u64,
        num_strata_deposited_b: u64,
    ) -> u64 {
        pessimal_abs(self, num_strata_deposited_a, num_strata_deposited_b).0
    }

    /// The absolute uncertainty bound at the pessimal rank.
    fn calc_mrca_uncertainty_abs_upper_bound_at_pessimal_rank(
        &self,
        num_strata_deposited_a: u64,
        num_strata_deposited_b: u64,
    ) -> u64 {
        pessimal_abs(self, num_strata_deposited_a, num_strata_deposited_b).1
    }

    /// MRCA rank at which the relative uncertainty bound is largest.
    fn calc_mrca_uncertainty_rel_upper_bound_pessimal_rank(
        &self,
        num_strata_deposited_a: u64,
        num_strata_deposited_b: u64,
    ) -> u64 {
        pessimal_rel(self, num_strata_deposited_a, num_strata_deposited_b).0
    }

    /// The relative uncertainty bound at the pessimal rank.
    fn calc_mrca_uncertainty_rel_upper_bound_at_pessimal_rank(
        &self,
        num_strata_deposited_a: u64,
        num_strata_deposited_b: u64,
    ) -> f64 {
        pessimal_rel(self, num_strata_deposited_a, num_strata_deposited_b).1
    }
}

/// Ranks retained by both of two columns under `policy`, restricted to
/// ranks below `min(n_a, n_b)`.
///
/// Policies without a deterministic retained set only guarantee rank 0.
pub(crate) fn common_retained_ranks<P: StratumRetentionPolicy>(
    policy: &P,
    num_strata_deposited_a: u64,
    num_strata_deposited_b: u64,
) -> Vec<u64> {
    let newest = num_strata_deposited_a.min(num_strata_deposited_b);
    if newest == 0 {
        return Vec::new();
    }
    let ranks_a = policy.iter_retained_ranks(num_strata_deposited_a);
    let ranks_b = policy.iter_retained_ranks(num_strata_deposited_b);
    let (Some(ranks_a), Some(ranks_b)) = (ranks_a, ranks_b) else {
        return vec![0];
    };

    let mut common = Vec::new();
    let mut iter_a = ranks_a.take_while(|&r| r < newest).peekable();
    let mut iter_b = ranks_b.take_while(|&r| r < newest).peekable();
    while let (Some(&ra), Some(&rb)) = (iter_a.peek(), iter_b.peek()) {
        match ra.cmp(&rb) {
            core::cmp::Ordering::Less => {
                iter_a.next();
            }
            core::cmp::Ordering::Greater => {
                iter_b.next();
            }
            core::cmp::Ordering::Equal => {
                common.push(ra);
                iter_a.next();
                iter_b.next();
            }
        }
    }
    common
}

/// Half-open `[lb, ub)` of consecutive common ranks enclosing `rank`.
fn enclosing_gap(common: &[u64], rank: u64, newest: u64) -> (u64, u64) {
    let idx = common.partition_point(|&r| r <= rank);
    let lb = if idx == 0 { 0 } else { common[idx - 1] };
    let ub = common.get(idx).copied().unwrap_or(newest);
    (lb, ub)
}

/// Iterate `(gap_begin, gap_end)` over the common ranks, closing at `newest`.
fn iter_gaps(common: &[u64], newest: u64) -> impl Iterator<Item = (u64, u64)> + '_ {
    common
        .iter()
        .enumerate()
        .map(move |(i, &begin)| (begin, common.get(i + 1).copied().unwrap_or(newest)))
}

fn pessimal_abs<P: StratumRetentionPolicy>(policy: &P, n_a: u64, n_b: u64) -> (u64, u64) {
    let newest = n_a.min(n_b);
    let common = common_retained_ranks(policy, n_a, n_b);
    let mut best = (0u64, 0u64);
    for (begin, end) in iter_gaps(&common, newest) {
        let uncertainty = end - begin - 1;
        if uncertainty > best.1 {
            best = (begin, uncertainty);
        }
    }
    best
}

fn pessimal_rel<P: StratumRetentionPolicy>(policy: &P, n_a: u64, n_b: u64) -> (u64, f64) {
    let newest = n_a.min(n_b);
    let common = common_retained_ranks(policy, n_a, n_b);
    let mut best = (0u64, 0.0f64);
    for (begin, end) in iter_gaps(&common, newest) {
        // within a gap the ratio peaks at the newest rank
        let rank = end - 1;
        let ratio = (end - begin - 1) as f64 / (newest - rank) as f64;
        if ratio > best.1 {
            best = (rank, ratio);
        }
    }
    best
}
