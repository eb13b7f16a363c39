use crate::differentia::Differentia;

/// Read-only surface shared by columns and specimens.
///
/// Every juxtaposition and reconstruction routine is written against this
/// trait, so either kind of artifact may be compared with the other.
pub trait HereditaryStratigraphicArtifact {
    fn get_num_strata_deposited(&self) -> u64;

    fn get_num_strata_retained(&self) -> usize;

    fn get_stratum_differentia_bit_width(&self) -> u8;

    fn get_rank_at_column_index(&self, index: usize) -> Option<u64>;

    fn get_differentia_at_column_index(&self, index: usize) -> Option<Differentia>;

    /// Retained ranks, ascending.
    fn iter_retained_ranks(&self) -> Box<dyn Iterator<Item = u64> + '_>;

    /// Retained differentiae, in rank order.
    fn iter_retained_differentia(&self) -> Box<dyn Iterator<Item = Differentia> + '_>;

    fn iter_rank_differentia_zip(&self) -> Box<dyn Iterator<Item = (u64, Differentia)> + '_> {
        Box::new(self.iter_retained_ranks().zip(self.iter_retained_differentia()))
    }

    /// Whether any deposited stratum has since been dropped.
    fn has_discarded_strata(&self) -> bool {
        self.get_num_strata_deposited() != self.get_num_strata_retained() as u64
    }

    /// Whether the retained ranks are exactly `0..num_strata_deposited`,
    /// laid out so that column index equals rank.
    fn has_contiguous_ranks(&self) -> bool {
        !self.has_discarded_strata()
    }

    fn get_column_index_of_rank(&self, rank: u64) -> Option<usize> {
        self.iter_retained_ranks().position(|r| r == rank)
    }
}
