use std::collections::BTreeSet;

use crate::column::HereditaryStratigraphicArtifact;
use crate::differentia::Differentia;
use crate::errors::{check_confidence_level, HstratError, Result};
use crate::reconstruction::juxtaposition::{
    calc_min_implausible_spurious_consecutive_differentia_collisions, CommonRankScan,
};

use super::HereditaryStratigraphicSpecimen;

/// Lanes compared per step when searching two rows for a mismatch.
const LANES: usize = 8;

/// A population aligned on the union of its retained ranks.
///
/// Values and presence flags are stored row-major, one row per specimen and
/// one column per rank in [`Self::get_ranks`]. Absent cells hold zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HereditaryStratigraphicAssemblage {
    ranks: Vec<u64>,
    values: Vec<u64>,
    mask: Vec<bool>,
    num_strata_deposited: Vec<u64>,
    differentia_bit_width: u8,
}

impl HereditaryStratigraphicAssemblage {
    pub fn from_specimens<A: HereditaryStratigraphicArtifact>(population: &[A]) -> Result<Self> {
        let first = population.first().ok_or(HstratError::EmptyPopulation)?;
        let differentia_bit_width = first.get_stratum_differentia_bit_width();
        for artifact in population {
            let actual = artifact.get_stratum_differentia_bit_width();
            if actual != differentia_bit_width {
                return Err(HstratError::IncompatibleDifferentiaBitWidth {
                    expected: differentia_bit_width,
                    actual,
                });
            }
        }

        let ranks: Vec<u64> = population
            .iter()
            .flat_map(|artifact| artifact.iter_retained_ranks())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let num_cells = ranks.len() * population.len();
        let mut values = vec![0; num_cells];
        let mut mask = vec![false; num_cells];
        for (row, artifact) in population.iter().enumerate() {
            let offset = row * ranks.len();
            let mut column = 0;
            for (rank, differentia) in artifact.iter_rank_differentia_zip() {
                // both sequences ascend, so the cursor only moves forward
                while ranks[column] < rank {
                    column += 1;
                }
                values[offset + column] = differentia.value();
                mask[offset + column] = true;
            }
        }

        Ok(Self {
            ranks,
            values,
            mask,
            num_strata_deposited: population
                .iter()
                .map(|artifact| artifact.get_num_strata_deposited())
                .collect(),
            differentia_bit_width,
        })
    }

    pub fn num_specimens(&self) -> usize {
        self.num_strata_deposited.len()
    }

    pub fn num_ranks(&self) -> usize {
        self.ranks.len()
    }

    /// Union of retained ranks, ascending.
    pub fn get_ranks(&self) -> &[u64] {
        &self.ranks
    }

    pub fn get_differentia_bit_width(&self) -> u8 {
        self.differentia_bit_width
    }

    fn check_row(&self, row: usize) -> Result<usize> {
        if row < self.num_specimens() {
            Ok(row)
        } else {
            Err(HstratError::IndexOutOfBounds { index: row, len: self.num_specimens() })
        }
    }

    pub fn row_values(&self, row: usize) -> Result<&[u64]> {
        let offset = self.check_row(row)? * self.num_ranks();
        Ok(&self.values[offset..offset + self.num_ranks()])
    }

    pub fn row_mask(&self, row: usize) -> Result<&[bool]> {
        let offset = self.check_row(row)? * self.num_ranks();
        Ok(&self.mask[offset..offset + self.num_ranks()])
    }

    /// Artifact view of one row, usable with every juxtaposition routine.
    pub fn row(&self, row: usize) -> Result<AssemblageRow<'_>> {
        Ok(AssemblageRow {
            assemblage: self,
            row: self.check_row(row)?,
        })
    }

    pub fn get_specimen(&self, row: usize) -> Result<HereditaryStratigraphicSpecimen> {
        self.row(row).map(|view| HereditaryStratigraphicSpecimen::from_artifact(&view))
    }

    pub fn iter_specimens(&self) -> impl Iterator<Item = HereditaryStratigraphicSpecimen> + '_ {
        (0..self.num_specimens()).map(move |row| {
            HereditaryStratigraphicSpecimen::from_artifact(&AssemblageRow { assemblage: self, row })
        })
    }

    /// Column of the first rank both rows retain with differing values.
    fn find_first_mismatch(&self, row_a: usize, row_b: usize) -> Option<usize> {
        let width = self.num_ranks();
        let (a, b) = (row_a * width, row_b * width);
        let lanes = self.mask[a..a + width]
            .chunks(LANES)
            .zip(self.mask[b..b + width].chunks(LANES))
            .zip(self.values[a..a + width].chunks(LANES))
            .zip(self.values[b..b + width].chunks(LANES));
        for (chunk, (((mask_a, mask_b), values_a), values_b)) in lanes.enumerate() {
            let hits = (0..mask_a.len()).fold(0u32, |hits, lane| {
                let hit = mask_a[lane] & mask_b[lane] & (values_a[lane] != values_b[lane]);
                hits | (u32::from(hit) << lane)
            });
            if hits != 0 {
                return Some(chunk * LANES + hits.trailing_zeros() as usize);
            }
        }
        None
    }

    fn scan_rows(&self, row_a: usize, row_b: usize, confidence_level: f64) -> Result<CommonRankScan> {
        check_confidence_level(confidence_level)?;
        let width = self.num_ranks();
        let (a, b) = (self.check_row(row_a)? * width, self.check_row(row_b)? * width);
        let threshold = calc_min_implausible_spurious_consecutive_differentia_collisions(
            self.differentia_bit_width,
            1.0 - confidence_level,
        );

        let end = self.find_first_mismatch(row_a, row_b);
        let limit = usize::try_from(threshold).unwrap_or(usize::MAX);
        let mut recent: Vec<u64> = (0..end.unwrap_or(width))
            .rev()
            .filter(|&column| self.mask[a + column] && self.mask[b + column])
            .take(limit)
            .map(|column| self.ranks[column])
            .collect();
        recent.reverse();

        let mut scan = CommonRankScan::new(threshold);
        for rank in recent {
            scan.push_match(rank);
        }
        scan.first_mismatch = end.map(|column| self.ranks[column]);
        Ok(scan)
    }

    /// Row-wise counterpart of
    /// [`calc_rank_of_last_retained_commonality_between`](crate::reconstruction::calc_rank_of_last_retained_commonality_between).
    pub fn calc_rank_of_last_retained_commonality_between_rows(
        &self,
        row_a: usize,
        row_b: usize,
        confidence_level: f64,
    ) -> Result<Option<u64>> {
        Ok(self.scan_rows(row_a, row_b, confidence_level)?.last_commonality())
    }

    pub fn calc_rank_of_first_retained_disparity_between_rows(
        &self,
        row_a: usize,
        row_b: usize,
        confidence_level: f64,
    ) -> Result<Option<u64>> {
        let scan = self.scan_rows(row_a, row_b, confidence_level)?;
        Ok(scan.first_disparity(
            self.num_strata_deposited[row_a],
            self.num_strata_deposited[row_b],
        ))
    }

    pub fn calc_rank_of_mrca_bounds_between_rows(
        &self,
        row_a: usize,
        row_b: usize,
        confidence_level: f64,
    ) -> Result<Option<(u64, u64)>> {
        let scan = self.scan_rows(row_a, row_b, confidence_level)?;
        let (n_a, n_b) = (self.num_strata_deposited[row_a], self.num_strata_deposited[row_b]);
        Ok(scan.last_commonality().map(|lower| {
            (lower, scan.first_disparity(n_a, n_b).unwrap_or_else(|| n_a.min(n_b)))
        }))
    }
}

/// Borrowed artifact view of one assemblage row.
#[derive(Debug, Clone, Copy)]
pub struct AssemblageRow<'a> {
    assemblage: &'a HereditaryStratigraphicAssemblage,
    row: usize,
}

impl AssemblageRow<'_> {
    fn cells(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        let width = self.assemblage.num_ranks();
        let offset = self.row * width;
        let mask = &self.assemblage.mask[offset..offset + width];
        let values = &self.assemblage.values[offset..offset + width];
        self.assemblage
            .ranks
            .iter()
            .zip(mask)
            .zip(values)
            .filter(|((_, present), _)| **present)
            .map(|((&rank, _), &value)| (rank, value))
    }
}

impl HereditaryStratigraphicArtifact for AssemblageRow<'_> {
    fn get_num_strata_deposited(&self) -> u64 {
        self.assemblage.num_strata_deposited[self.row]
    }

    fn get_num_strata_retained(&self) -> usize {
        self.cells().count()
    }

    fn get_stratum_differentia_bit_width(&self) -> u8 {
        self.assemblage.differentia_bit_width
    }

    fn get_rank_at_column_index(&self, index: usize) -> Option<u64> {
        self.cells().nth(index).map(|(rank, _)| rank)
    }

    fn get_differentia_at_column_index(&self, index: usize) -> Option<Differentia> {
        let bit_width = self.assemblage.differentia_bit_width;
        self.cells()
            .nth(index)
            .map(|(_, value)| Differentia::new(value, bit_width))
    }

    fn iter_retained_ranks(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        Box::new(self.cells().map(|(rank, _)| rank))
    }

    fn iter_retained_differentia(&self) -> Box<dyn Iterator<Item = Differentia> + '_> {
        let bit_width = self.assemblage.differentia_bit_width;
        Box::new(self.cells().map(move |(_, value)| Differentia::new(value, bit_width)))
    }

    fn iter_rank_differentia_zip(&self) -> Box<dyn Iterator<Item = (u64, Differentia)> + '_> {
        let bit_width = self.assemblage.differentia_bit_width;
        Box::new(self.cells().map(move |(rank, value)| (rank, Differentia::new(value, bit_width))))
    }
}
