#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::column::HereditaryStratigraphicArtifact;
use crate::differentia::Differentia;
use crate::errors::{check_bit_width, HstratError, Result};

/// Frozen, read-only snapshot of a column's retained strata.
///
/// Specimens drop the policy, RNG and annotations, keeping only what
/// juxtaposition and reconstruction read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HereditaryStratigraphicSpecimen {
    retained_ranks: Vec<u64>,
    differentia_vals: Vec<Differentia>,
    num_strata_deposited: u64,
    differentia_bit_width: u8,
}

impl HereditaryStratigraphicSpecimen {
    /// Assemble a specimen from raw parts.
    ///
    /// Ranks must be strictly ascending and below `num_strata_deposited`,
    /// with one differentia per rank fitting in `differentia_bit_width`.
    pub fn new(
        retained_ranks: Vec<u64>,
        differentia_vals: Vec<Differentia>,
        num_strata_deposited: u64,
        differentia_bit_width: u8,
    ) -> Result<Self> {
        check_bit_width(differentia_bit_width)?;
        if retained_ranks.len() != differentia_vals.len() {
            return Err(HstratError::DeserializationError(format!(
                "{} retained ranks but {} differentia values",
                retained_ranks.len(),
                differentia_vals.len()
            )));
        }
        if retained_ranks.windows(2).any(|w| w[0] >= w[1]) {
            return Err(HstratError::DeserializationError(
                "retained ranks must be strictly ascending".to_string(),
            ));
        }
        if let Some(&newest) = retained_ranks.last() {
            if newest >= num_strata_deposited {
                return Err(HstratError::DeserializationError(format!(
                    "retained rank {newest} not below {num_strata_deposited} strata deposited"
                )));
            }
        }
        if let Some(bad) = differentia_vals.iter().find(|d| !d.fits(differentia_bit_width)) {
            return Err(HstratError::DeserializationError(format!(
                "differentia {} exceeds {differentia_bit_width} bits",
                bad.value()
            )));
        }
        Ok(Self {
            retained_ranks,
            differentia_vals,
            num_strata_deposited,
            differentia_bit_width,
        })
    }

    pub fn from_artifact<A: HereditaryStratigraphicArtifact + ?Sized>(artifact: &A) -> Self {
        let (retained_ranks, differentia_vals) = artifact.iter_rank_differentia_zip().unzip();
        Self {
            retained_ranks,
            differentia_vals,
            num_strata_deposited: artifact.get_num_strata_deposited(),
            differentia_bit_width: artifact.get_stratum_differentia_bit_width(),
        }
    }

    pub fn get_retained_ranks(&self) -> &[u64] {
        &self.retained_ranks
    }

    pub fn get_differentia_vals(&self) -> &[Differentia] {
        &self.differentia_vals
    }
}

impl HereditaryStratigraphicArtifact for HereditaryStratigraphicSpecimen {
    fn get_num_strata_deposited(&self) -> u64 {
        self.num_strata_deposited
    }

    fn get_num_strata_retained(&self) -> usize {
        self.retained_ranks.len()
    }

    fn get_stratum_differentia_bit_width(&self) -> u8 {
        self.differentia_bit_width
    }

    fn get_rank_at_column_index(&self, index: usize) -> Option<u64> {
        self.retained_ranks.get(index).copied()
    }

    fn get_differentia_at_column_index(&self, index: usize) -> Option<Differentia> {
        self.differentia_vals.get(index).copied()
    }

    fn iter_retained_ranks(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        Box::new(self.retained_ranks.iter().copied())
    }

    fn iter_retained_differentia(&self) -> Box<dyn Iterator<Item = Differentia> + '_> {
        Box::new(self.differentia_vals.iter().copied())
    }

    fn get_column_index_of_rank(&self, rank: u64) -> Option<usize> {
        self.retained_ranks.binary_search(&rank).ok()
    }
}

/// Snapshot any artifact as a specimen.
pub fn col_to_specimen<A: HereditaryStratigraphicArtifact + ?Sized>(
    column: &A,
) -> HereditaryStratigraphicSpecimen {
    HereditaryStratigraphicSpecimen::from_artifact(column)
}

/// Snapshot every member of a population, in order.
///
/// Runs in parallel with the `rayon` feature.
pub fn pop_to_specimens<A>(population: &[A]) -> Vec<HereditaryStratigraphicSpecimen>
where
    A: HereditaryStratigraphicArtifact + Sync,
{
    #[cfg(feature = "rayon")]
    let specimens = population.par_iter().map(col_to_specimen).collect();

    #[cfg(not(feature = "rayon"))]
    let specimens = population.iter().map(col_to_specimen).collect();

    specimens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::HereditaryStratigraphicColumn;
    use crate::policies::{FixedResolutionPolicy, PerfectResolutionPolicy};
    use crate::reconstruction::calc_rank_of_mrca_bounds_between;

    #[test]
    fn snapshot_matches_column() {
        let mut col = HereditaryStratigraphicColumn::with_seed(FixedResolutionPolicy::new(4), 32, 3);
        col.deposit_strata(30);
        let specimen = col_to_specimen(&col);

        assert_eq!(specimen.get_num_strata_deposited(), 31);
        assert_eq!(specimen.get_num_strata_retained(), col.get_num_strata_retained());
        assert_eq!(specimen.get_stratum_differentia_bit_width(), 32);
        assert!(specimen.iter_retained_ranks().eq(col.iter_retained_ranks()));
        assert!(specimen.iter_retained_differentia().eq(col.iter_retained_differentia()));
        assert_eq!(specimen.get_column_index_of_rank(28), Some(7));
        assert_eq!(specimen.get_column_index_of_rank(29), None);
        assert!(specimen.has_discarded_strata());
    }

    #[test]
    fn specimens_compare_with_columns() {
        let mut root = HereditaryStratigraphicColumn::with_seed(PerfectResolutionPolicy::new(), 64, 4);
        root.deposit_strata(7);
        let a = root.clone_nth_descendant(3);
        let b = root.clone_nth_descendant(5);
        let expected = calc_rank_of_mrca_bounds_between(&a, &b, 0.95);
        let specimen_b = col_to_specimen(&b);
        assert_eq!(calc_rank_of_mrca_bounds_between(&a, &specimen_b, 0.95), expected);
        assert_eq!(expected, Some((7, 8)));
    }

    #[test]
    fn population_snapshot_keeps_order() {
        let population: Vec<_> = (0..4)
            .map(|seed| HereditaryStratigraphicColumn::with_seed(PerfectResolutionPolicy::new(), 16, seed))
            .collect();
        let specimens = pop_to_specimens(&population);
        assert_eq!(specimens.len(), 4);
        for (specimen, col) in specimens.iter().zip(&population) {
            assert_eq!(specimen, &col_to_specimen(col));
        }
    }

    #[test]
    fn new_validates_parts() {
        let d = |v| Differentia::new(v, 8);
        assert!(HereditaryStratigraphicSpecimen::new(vec![0, 2], vec![d(1), d(2)], 3, 8).is_ok());
        assert!(HereditaryStratigraphicSpecimen::new(vec![0, 2], vec![d(1)], 3, 8).is_err());
        assert!(HereditaryStratigraphicSpecimen::new(vec![2, 0], vec![d(1), d(2)], 3, 8).is_err());
        assert!(HereditaryStratigraphicSpecimen::new(vec![0, 3], vec![d(1), d(2)], 3, 8).is_err());
        assert_eq!(
            HereditaryStratigraphicSpecimen::new(vec![], vec![], 0, 0),
            Err(HstratError::InvalidBitWidth(0))
        );
        let wide = Differentia::new(300, 16);
        assert!(HereditaryStratigraphicSpecimen::new(vec![0], vec![wide], 1, 8).is_err());
    }
}
