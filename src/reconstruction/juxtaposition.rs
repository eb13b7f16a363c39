use std::collections::VecDeque;
use std::iter::Peekable;

use crate::column::HereditaryStratigraphicArtifact;
use crate::differentia::Differentia;

/// Narrowest differentia for which the binary-search disparity path is
/// trusted; below it spurious collisions past the first disparity are too
/// likely for bisection to land on the first one.
pub const MIN_BISECT_DIFFERENTIA_BIT_WIDTH: u8 = 32;

/// Probability of a spurious differentia collision at the given bit width.
///
/// Two independent random differentia at `bit_width` bits match with
/// probability `1 / 2^bit_width`.
pub fn calc_probability_differentia_collision(bit_width: u8) -> f64 {
    2f64.powi(-i32::from(bit_width))
}

/// Minimum number of consecutive spurious collisions needed to fool a test
/// at the given significance level.
///
/// Returns the smallest `n` such that `p^n <= significance_level`, where
/// `p = calc_probability_differentia_collision(bit_width)`.
///
/// Special cases:
/// - `significance_level == 0.0` → `u64::MAX` (impossible to satisfy)
/// - `significance_level >= p` → `1` (a single collision already exceeds threshold)
pub fn calc_min_implausible_spurious_consecutive_differentia_collisions(
    bit_width: u8,
    significance_level: f64,
) -> u64 {
    if significance_level == 0.0 {
        return u64::MAX;
    }
    let p = calc_probability_differentia_collision(bit_width);
    if significance_level >= p {
        return 1;
    }
    // both logs are negative
    ((significance_level.ln() / p.ln()).ceil() as u64).max(1)
}

/// Shared differentia width of two artifacts.
///
/// # Panics
/// Panics if the widths differ.
pub(crate) fn check_comparable<A, B>(a: &A, b: &B) -> u8
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let bit_width = a.get_stratum_differentia_bit_width();
    assert_eq!(
        bit_width,
        b.get_stratum_differentia_bit_width(),
        "artifacts with different differentia bit widths are not comparable"
    );
    bit_width
}

/// Collision threshold for `confidence_level`.
///
/// # Panics
/// Panics if `confidence_level` is outside `[0, 1)`.
pub(crate) fn collision_threshold(bit_width: u8, confidence_level: f64) -> u64 {
    assert!(
        (0.0..1.0).contains(&confidence_level),
        "confidence_level must be in [0, 1), got {confidence_level}"
    );
    calc_min_implausible_spurious_consecutive_differentia_collisions(
        bit_width,
        1.0 - confidence_level,
    )
}

/// Merge of two ascending `(rank, differentia)` streams, yielding
/// `(rank, differentia_a, differentia_b)` at every rank both retain.
pub struct CommonRanks<I: Iterator, J: Iterator> {
    a: Peekable<I>,
    b: Peekable<J>,
}

impl<I, J> Iterator for CommonRanks<I, J>
where
    I: Iterator<Item = (u64, Differentia)>,
    J: Iterator<Item = (u64, Differentia)>,
{
    type Item = (u64, Differentia, Differentia);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let &(rank_a, _) = self.a.peek()?;
            let &(rank_b, _) = self.b.peek()?;
            match rank_a.cmp(&rank_b) {
                core::cmp::Ordering::Less => {
                    self.a.next();
                }
                core::cmp::Ordering::Greater => {
                    self.b.next();
                }
                core::cmp::Ordering::Equal => {
                    let (rank, diff_a) = self.a.next()?;
                    let (_, diff_b) = self.b.next()?;
                    return Some((rank, diff_a, diff_b));
                }
            }
        }
    }
}

/// Iterate the ranks both artifacts retain, with each side's differentia.
pub fn iter_common_ranks<'a, A, B>(
    a: &'a A,
    b: &'a B,
) -> CommonRanks<
    Box<dyn Iterator<Item = (u64, Differentia)> + 'a>,
    Box<dyn Iterator<Item = (u64, Differentia)> + 'a>,
>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    CommonRanks {
        a: a.iter_rank_differentia_zip().peekable(),
        b: b.iter_rank_differentia_zip().peekable(),
    }
}

/// Iterate common retained ranks with matching differentia, stopping at the
/// first common rank where differentia differs.
pub fn iter_ranks_of_retained_commonality_between<'a, A, B>(
    a: &'a A,
    b: &'a B,
) -> impl Iterator<Item = u64> + 'a
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    check_comparable(a, b);
    iter_common_ranks(a, b)
        .take_while(|(_, diff_a, diff_b)| diff_a == diff_b)
        .map(|(rank, _, _)| rank)
}

/// The `n`-th (0-indexed) rank retained by both artifacts, regardless of
/// differentia.
pub fn get_nth_common_rank_between<A, B>(a: &A, b: &B, n: usize) -> Option<u64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    iter_common_ranks(a, b).nth(n).map(|(rank, _, _)| rank)
}

/// Outcome of walking two artifacts' common ranks up to their first
/// mismatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CommonRankScan {
    threshold: usize,
    /// Most recent matching common ranks before the mismatch, oldest first.
    recent_matches: VecDeque<u64>,
    pub(crate) first_mismatch: Option<u64>,
}

impl CommonRankScan {
    pub(crate) fn new(threshold: u64) -> Self {
        let threshold = usize::try_from(threshold).unwrap_or(usize::MAX);
        Self {
            threshold,
            recent_matches: VecDeque::with_capacity(threshold.min(64)),
            first_mismatch: None,
        }
    }

    pub(crate) fn push_match(&mut self, rank: u64) {
        if self.recent_matches.len() == self.threshold {
            self.recent_matches.pop_front();
        }
        self.recent_matches.push_back(rank);
    }

    /// With a mismatch observed, the `threshold`-th most recent match: every
    /// later match may be spurious. Without one, the newest match.
    pub(crate) fn last_commonality(&self) -> Option<u64> {
        match self.first_mismatch {
            Some(_) if self.recent_matches.len() == self.threshold => {
                self.recent_matches.front().copied()
            }
            Some(_) => None,
            None => self.recent_matches.back().copied(),
        }
    }

    pub(crate) fn first_disparity(&self, num_deposited_a: u64, num_deposited_b: u64) -> Option<u64> {
        self.first_mismatch.or_else(|| {
            (num_deposited_a != num_deposited_b).then(|| num_deposited_a.min(num_deposited_b))
        })
    }
}

fn scan_linear<A, B>(a: &A, b: &B, threshold: u64) -> CommonRankScan
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let mut scan = CommonRankScan::new(threshold);
    for (rank, diff_a, diff_b) in iter_common_ranks(a, b) {
        if diff_a == diff_b {
            scan.push_match(rank);
        } else {
            scan.first_mismatch = Some(rank);
            break;
        }
    }
    scan
}

/// Binary search for the first disparity over artifacts whose column index
/// equals rank. Assumes matches form a prefix.
fn scan_bisect<A, B>(a: &A, b: &B, threshold: u64) -> CommonRankScan
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let newest = a.get_num_strata_deposited().min(b.get_num_strata_deposited());
    let differs = |rank: u64| {
        let index = rank as usize;
        a.get_differentia_at_column_index(index) != b.get_differentia_at_column_index(index)
    };

    let (mut lo, mut hi) = (0u64, newest);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if differs(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    let mut scan = CommonRankScan::new(threshold);
    for rank in lo.saturating_sub(threshold)..lo {
        scan.push_match(rank);
    }
    if lo < newest {
        scan.first_mismatch = Some(lo);
    }
    scan
}

pub(crate) fn scan_common_ranks<A, B>(a: &A, b: &B, confidence_level: f64) -> CommonRankScan
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let bit_width = check_comparable(a, b);
    let threshold = collision_threshold(bit_width, confidence_level);
    if bit_width >= MIN_BISECT_DIFFERENTIA_BIT_WIDTH
        && a.has_contiguous_ranks()
        && b.has_contiguous_ranks()
    {
        scan_bisect(a, b, threshold)
    } else {
        scan_linear(a, b, threshold)
    }
}

/// Rank of the last retained commonality, corrected for spurious
/// collisions.
///
/// Walks common ranks until the first differentia mismatch. If a mismatch
/// is found, the matches just before it may be chance collisions, so the
/// result steps back to the `k`-th most recent match, where `k` is the
/// collision threshold at `confidence_level`. Returns `None` when fewer than
/// `k` matches precede the mismatch. Without any mismatch the newest common
/// rank is returned.
///
/// # Panics
/// Panics if the artifacts' differentia widths differ or
/// `confidence_level` lies outside `[0, 1)`.
pub fn calc_rank_of_last_retained_commonality_between<A, B>(
    a: &A,
    b: &B,
    confidence_level: f64,
) -> Option<u64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    scan_common_ranks(a, b, confidence_level).last_commonality()
}

/// Rank of the first retained disparity.
///
/// This is the first common rank whose differentia differ. Without such a
/// rank, it is `min(n_a, n_b)` when the artifacts have different deposit
/// counts and `None` when they are equal.
///
/// `confidence_level` is validated for symmetry with
/// [`calc_rank_of_last_retained_commonality_between`] but does not move the
/// result: collision correction widens the commonality side only.
///
/// # Panics
/// Panics if the artifacts' differentia widths differ or
/// `confidence_level` lies outside `[0, 1)`.
pub fn calc_rank_of_first_retained_disparity_between<A, B>(
    a: &A,
    b: &B,
    confidence_level: f64,
) -> Option<u64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    scan_common_ranks(a, b, confidence_level)
        .first_disparity(a.get_num_strata_deposited(), b.get_num_strata_deposited())
}

/// Ranks elapsed in `focal` since the last retained commonality with `other`.
pub fn calc_ranks_since_last_retained_commonality_with<A, B>(
    focal: &A,
    other: &B,
    confidence_level: f64,
) -> Option<u64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let last = calc_rank_of_last_retained_commonality_between(focal, other, confidence_level)?;
    (focal.get_num_strata_deposited() - 1).checked_sub(last)
}

/// Ranks elapsed in `focal` since the first retained disparity with `other`.
///
/// `None` when there is no disparity or it lies past `focal`'s newest rank.
pub fn calc_ranks_since_first_retained_disparity_with<A, B>(
    focal: &A,
    other: &B,
    confidence_level: f64,
) -> Option<u64>
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    let first = calc_rank_of_first_retained_disparity_between(focal, other, confidence_level)?;
    (focal.get_num_strata_deposited() - 1).checked_sub(first)
}

/// Whether the artifacts differ at their earliest common rank.
///
/// Differentia mismatches are never spurious, and every column retains its
/// founding stratum, so this proves independent origins.
///
/// # Panics
/// Panics if the artifacts' differentia widths differ.
pub fn does_definitively_share_no_common_ancestor<A, B>(a: &A, b: &B) -> bool
where
    A: HereditaryStratigraphicArtifact + ?Sized,
    B: HereditaryStratigraphicArtifact + ?Sized,
{
    check_comparable(a, b);
    iter_common_ranks(a, b)
        .next()
        .map_or(false, |(_, diff_a, diff_b)| diff_a != diff_b)
}
