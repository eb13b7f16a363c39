use crate::column::HereditaryStratigraphicArtifact;

use super::juxtaposition::{
    calc_probability_differentia_collision, check_comparable, iter_common_ranks,
};
use super::priors::{ArbitraryPrior, Prior};

/// Selection of MRCA rank estimators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Estimator {
    /// Midpoint of the newest interval between a matching and a mismatching
    /// (or missing) common rank.
    Naive,
    /// Conditioned mean of the most probable interval under the prior.
    #[default]
    MaximumLikelihood,
    /// Posterior mean across all intervals.
    Unbiased,
}

/// Half-open rank intervals that could hold the MRCA, newest first.
///
/// Each boundary is a common rank where the differentiae matched; the newest
/// interval ends at the first mismatch, or at the shallower depth when the
/// artifacts never disagree. The `i`-th interval from the newest requires
/// `i` spurious collisions to be correct.
fn extract_candidate_intervals<A, B>(a: &A, b: &B) -> Vec<(u64, u64)>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let mut matches = Vec::new();
    let mut upper = a.get_num_strata_deposited().min(b.get_num_strata_deposited());
    for (rank, diff_a, diff_b) in iter_common_ranks(a, b) {
        if diff_a != diff_b {
            upper = rank;
            break;
        }
        matches.push(rank);
    }
    matches.push(upper);
    matches.windows(2).rev().map(|w| (w[0], w[1])).collect()
}

/// `(weight, conditioned mean)` per interval, weights scaled so the
/// heaviest is one.
///
/// Weights combine in log space; deep ranks overflow the raw proxies.
fn weighted_intervals(
    intervals: &[(u64, u64)],
    p_collision: f64,
    prior: &dyn Prior,
) -> Vec<(f64, f64)> {
    let ln_collision = p_collision.ln();
    let log_weights: Vec<f64> = intervals
        .iter()
        .enumerate()
        .map(|(i, &(begin, end))| {
            prior.calc_interval_log_probability_proxy(begin, end) + i as f64 * ln_collision
        })
        .collect();
    let max = log_weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    intervals
        .iter()
        .zip(log_weights)
        .map(|(&(begin, end), log_weight)| {
            (
                (log_weight - max).exp(),
                prior.calc_interval_conditioned_mean(begin, end),
            )
        })
        .collect()
}

/// Point estimate of the MRCA rank of `a` and `b`.
///
/// Returns `None` when no common rank matches, which includes artifacts
/// that disagree at their founding stratum.
///
/// # Panics
/// Panics if the artifacts' differentia widths differ.
pub fn estimate_rank_of_mrca_between<A, B>(
    a: &A,
    b: &B,
    estimator: Estimator,
    prior: &dyn Prior,
) -> Option<f64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let bit_width = check_comparable(a, b);
    let intervals = extract_candidate_intervals(a, b);
    let &(newest_begin, newest_end) = intervals.first()?;
    let p_collision = calc_probability_differentia_collision(bit_width);

    match estimator {
        Estimator::Naive => Some((newest_begin + newest_end) as f64 / 2.0 - 0.5),
        Estimator::MaximumLikelihood => weighted_intervals(&intervals, p_collision, prior)
            .into_iter()
            .fold(None, |best: Option<(f64, f64)>, (weight, mean)| match best {
                Some((best_weight, _)) if best_weight >= weight => best,
                _ => Some((weight, mean)),
            })
            .map(|(_, mean)| mean),
        Estimator::Unbiased => {
            let (total, weighted_sum) = weighted_intervals(&intervals, p_collision, prior)
                .into_iter()
                .fold((0.0, 0.0), |(total, sum), (weight, mean)| {
                    (total + weight, sum + weight * mean)
                });
            (total > 0.0).then(|| weighted_sum / total)
        }
    }
}

/// Estimated ranks elapsed in `focal` since its MRCA with `other`.
pub fn estimate_ranks_since_mrca_with<A, B>(
    focal: &A,
    other: &B,
    estimator: Estimator,
    prior: &dyn Prior,
) -> Option<f64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let estimate = estimate_rank_of_mrca_between(focal, other, estimator, prior)?;
    Some(focal.get_num_strata_deposited() as f64 - 1.0 - estimate)
}

/// Estimated path length between `a` and `b` through their MRCA.
pub fn estimate_patristic_distance_between<A, B>(
    a: &A,
    b: &B,
    estimator: Estimator,
    prior: &dyn Prior,
) -> Option<f64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let estimate = estimate_rank_of_mrca_between(a, b, estimator, prior)?;
    let newest_a = a.get_num_strata_deposited() as f64 - 1.0;
    let newest_b = b.get_num_strata_deposited() as f64 - 1.0;
    Some(newest_a - estimate + newest_b - estimate)
}

/// Quick MRCA estimate: maximum likelihood under [`ArbitraryPrior`].
pub fn ballpark_rank_of_mrca_between<A, B>(a: &A, b: &B) -> Option<f64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    estimate_rank_of_mrca_between(a, b, Estimator::MaximumLikelihood, &ArbitraryPrior)
}

pub fn ballpark_ranks_since_mrca_with<A, B>(focal: &A, other: &B) -> Option<f64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    estimate_ranks_since_mrca_with(focal, other, Estimator::MaximumLikelihood, &ArbitraryPrior)
}

pub fn ballpark_patristic_distance_between<A, B>(a: &A, b: &B) -> Option<f64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    estimate_patristic_distance_between(a, b, Estimator::MaximumLikelihood, &ArbitraryPrior)
}
