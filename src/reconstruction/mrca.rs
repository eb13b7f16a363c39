#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::column::HereditaryStratigraphicArtifact;
use crate::errors::{check_confidence_level, HstratError, Result};

use super::juxtaposition::{
    calc_probability_differentia_collision, check_comparable, collision_threshold,
    scan_common_ranks,
};

/// Bounds on the rank of the most recent common ancestor (MRCA) of two
/// artifacts, as a half-open interval `[lower, upper)`.
///
/// `lower` is the collision-corrected last retained commonality and `upper`
/// the first retained disparity, or `min(n_a, n_b)` when none was observed.
/// Returns `None` if no common ancestry is detectable at
/// `confidence_level`.
///
/// # Panics
/// Panics if the artifacts' differentia widths differ or
/// `confidence_level` lies outside `[0, 1)`.
pub fn calc_rank_of_mrca_bounds_between<A, B>(
    a: &A,
    b: &B,
    confidence_level: f64,
) -> Option<(u64, u64)>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let scan = scan_common_ranks(a, b, confidence_level);
    let (n_a, n_b) = (a.get_num_strata_deposited(), b.get_num_strata_deposited());
    let lower = scan.last_commonality()?;
    let upper = scan.first_disparity(n_a, n_b).unwrap_or_else(|| n_a.min(n_b));
    debug_assert!(lower < upper);
    Some((lower, upper))
}

/// Number of ranks strictly inside the MRCA bounds that could still hold
/// the MRCA, i.e. `upper - lower - 1`.
pub fn calc_rank_of_mrca_uncertainty_between<A, B>(
    a: &A,
    b: &B,
    confidence_level: f64,
) -> Option<u64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let (lower, upper) = calc_rank_of_mrca_bounds_between(a, b, confidence_level)?;
    Some(upper - lower - 1)
}

/// Whether common ancestry is detectable at `confidence_level`.
pub fn does_have_any_common_ancestor<A, B>(a: &A, b: &B, confidence_level: f64) -> bool
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    scan_common_ranks(a, b, confidence_level)
        .last_commonality()
        .is_some()
}

/// Bounds on the number of ranks elapsed in `focal` since its MRCA with
/// `other`, as a half-open interval.
pub fn calc_ranks_since_mrca_bounds_with<A, B>(
    focal: &A,
    other: &B,
    confidence_level: f64,
) -> Option<(u64, u64)>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let (lower, upper) = calc_rank_of_mrca_bounds_between(focal, other, confidence_level)?;
    let newest = focal.get_num_strata_deposited() - 1;
    // mrca in [lower, upper) puts newest - mrca in (newest - upper, newest - lower]
    Some(((newest + 1).saturating_sub(upper), newest - lower + 1))
}

/// Width of [`calc_ranks_since_mrca_bounds_with`] less one, matching
/// [`calc_rank_of_mrca_uncertainty_between`].
pub fn calc_ranks_since_mrca_uncertainty_with<A, B>(
    focal: &A,
    other: &B,
    confidence_level: f64,
) -> Option<u64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let (lower, upper) = calc_ranks_since_mrca_bounds_with(focal, other, confidence_level)?;
    Some(upper - lower - 1)
}

/// Bounds on the path length between two artifacts through their MRCA:
/// the elementwise sum of each side's ranks-since-MRCA bounds.
pub fn calc_patristic_distance_bounds_between<A, B>(
    a: &A,
    b: &B,
    confidence_level: f64,
) -> Option<(u64, u64)>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let (lower_a, upper_a) = calc_ranks_since_mrca_bounds_with(a, b, confidence_level)?;
    let (lower_b, upper_b) = calc_ranks_since_mrca_bounds_with(b, a, confidence_level)?;
    Some((lower_a + lower_b, upper_a + upper_b))
}

/// Probability that the bounds at `confidence_level` are not fooled by
/// spurious collisions: `1 - p^k` for collision threshold `k`.
pub fn calc_rank_of_mrca_bounds_provided_confidence_level<A, B>(
    a: &A,
    b: &B,
    confidence_level: f64,
) -> f64
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let bit_width = check_comparable(a, b);
    let threshold = collision_threshold(bit_width, confidence_level);
    let p = calc_probability_differentia_collision(bit_width);
    1.0 - p.powf(threshold as f64)
}

fn check_population<A: HereditaryStratigraphicArtifact>(
    population: &[A],
    confidence_level: f64,
) -> Result<u8> {
    check_confidence_level(confidence_level)?;
    let first = population.first().ok_or(HstratError::EmptyPopulation)?;
    let expected = first.get_stratum_differentia_bit_width();
    for artifact in population {
        let actual = artifact.get_stratum_differentia_bit_width();
        if actual != expected {
            return Err(HstratError::IncompatibleDifferentiaBitWidth { expected, actual });
        }
    }
    Ok(expected)
}

/// Bounds on the rank of the MRCA of an entire population.
///
/// The population MRCA is the shallowest pairwise MRCA, and every split
/// below the root separates the first member from someone, so comparing the
/// first member against each other member suffices. A single member is its
/// own MRCA at its newest rank. `Ok(None)` if any pair lacks detectable
/// common ancestry.
pub fn calc_rank_of_mrca_bounds_among<A: HereditaryStratigraphicArtifact>(
    population: &[A],
    confidence_level: f64,
) -> Result<Option<(u64, u64)>> {
    check_population(population, confidence_level)?;
    let (first, rest) = population.split_first().ok_or(HstratError::EmptyPopulation)?;
    let newest = first.get_num_strata_deposited();
    let mut bounds = (newest - 1, newest);
    for other in rest {
        let Some((lower, upper)) = calc_rank_of_mrca_bounds_between(first, other, confidence_level)
        else {
            return Ok(None);
        };
        bounds = (bounds.0.min(lower), bounds.1.min(upper));
    }
    Ok(Some(bounds))
}

pub fn calc_rank_of_mrca_uncertainty_among<A: HereditaryStratigraphicArtifact>(
    population: &[A],
    confidence_level: f64,
) -> Result<Option<u64>> {
    Ok(calc_rank_of_mrca_bounds_among(population, confidence_level)?
        .map(|(lower, upper)| upper - lower - 1))
}

pub fn does_share_any_common_ancestor_among<A: HereditaryStratigraphicArtifact>(
    population: &[A],
    confidence_level: f64,
) -> Result<bool> {
    Ok(calc_rank_of_mrca_bounds_among(population, confidence_level)?.is_some())
}

/// MRCA rank bounds for every pair, as a symmetric row-major matrix.
/// Diagonal entries compare each member with itself.
///
/// Rows are computed in parallel with the `rayon` feature.
pub fn calc_pairwise_rank_of_mrca_bounds<A>(
    population: &[A],
    confidence_level: f64,
) -> Result<Vec<Vec<Option<(u64, u64)>>>>
where
    A: HereditaryStratigraphicArtifact + Sync,
{
    check_population(population, confidence_level)?;
    let row = |i: usize| -> Vec<Option<(u64, u64)>> {
        population
            .iter()
            .map(|other| calc_rank_of_mrca_bounds_between(&population[i], other, confidence_level))
            .collect()
    };

    #[cfg(feature = "rayon")]
    let matrix = (0..population.len()).into_par_iter().map(row).collect();

    #[cfg(not(feature = "rayon"))]
    let matrix = (0..population.len()).map(row).collect();

    Ok(matrix)
}
