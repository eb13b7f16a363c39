use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::stratum::{Annotation, Stratum};
use crate::differentia::Differentia;

/// Which backing container a column keeps its strata in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Parallel rank/differentia vectors: O(1) indexed access.
    #[default]
    Vector,
    /// Rank-keyed ordered map: O(log n) access by rank.
    Map,
}

/// Dense store: strata in parallel vectors sorted by rank.
#[derive(Clone, Debug, Default)]
pub struct VectorStore {
    ranks: Vec<u64>,
    differentiae: Vec<Differentia>,
    annotations: BTreeMap<u64, Annotation>,
}

/// Sparse store: strata keyed by rank.
#[derive(Clone, Debug, Default)]
pub struct MapStore {
    strata: BTreeMap<u64, (Differentia, Option<Annotation>)>,
}

/// Ordered container of a column's retained strata.
///
/// Ranks are strictly increasing; deposits must arrive in rank order.
#[derive(Clone, Debug)]
pub enum OrderedStore {
    Vector(VectorStore),
    Map(MapStore),
}

impl Default for OrderedStore {
    fn default() -> Self {
        Self::new(StoreKind::default())
    }
}

impl PartialEq for OrderedStore {
    fn eq(&self, other: &Self) -> bool {
        self.num_strata_retained() == other.num_strata_retained()
            && self.iter_retained_strata().eq(other.iter_retained_strata())
    }
}

impl OrderedStore {
    pub fn new(kind: StoreKind) -> Self {
        match kind {
            StoreKind::Vector => Self::Vector(VectorStore::default()),
            StoreKind::Map => Self::Map(MapStore::default()),
        }
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            Self::Vector(_) => StoreKind::Vector,
            Self::Map(_) => StoreKind::Map,
        }
    }

    /// Append a stratum at `rank`, which must exceed every retained rank.
    pub fn deposit_stratum(
        &mut self,
        rank: u64,
        differentia: Differentia,
        annotation: Option<Annotation>,
    ) {
        debug_assert!(
            self.iter_retained_ranks().last().map_or(true, |last| last < rank),
            "rank {rank} deposited out of order"
        );
        match self {
            Self::Vector(store) => {
                store.ranks.push(rank);
                store.differentiae.push(differentia);
                if let Some(annotation) = annotation {
                    store.annotations.insert(rank, annotation);
                }
            }
            Self::Map(store) => {
                store.strata.insert(rank, (differentia, annotation));
            }
        }
    }

    pub fn num_strata_retained(&self) -> usize {
        match self {
            Self::Vector(store) => store.ranks.len(),
            Self::Map(store) => store.strata.len(),
        }
    }

    pub fn reserve(&mut self, additional: usize) {
        if let Self::Vector(store) = self {
            store.ranks.reserve(additional);
            store.differentiae.reserve(additional);
        }
    }

    pub fn get_rank_at_column_index(&self, index: usize) -> Option<u64> {
        match self {
            Self::Vector(store) => store.ranks.get(index).copied(),
            Self::Map(store) => store.strata.keys().nth(index).copied(),
        }
    }

    pub fn get_differentia_at_column_index(&self, index: usize) -> Option<Differentia> {
        match self {
            Self::Vector(store) => store.differentiae.get(index).copied(),
            Self::Map(store) => store.strata.values().nth(index).map(|(d, _)| *d),
        }
    }

    pub fn get_stratum_at_column_index(&self, index: usize) -> Option<Stratum> {
        match self {
            Self::Vector(store) => {
                let rank = *store.ranks.get(index)?;
                Some(store.stratum(index, rank))
            }
            Self::Map(store) => store
                .strata
                .iter()
                .nth(index)
                .map(|(&rank, (d, a))| Stratum {
                    rank,
                    differentia: *d,
                    annotation: a.clone(),
                }),
        }
    }

    pub fn get_column_index_of_rank(&self, rank: u64) -> Option<usize> {
        match self {
            Self::Vector(store) => store.ranks.binary_search(&rank).ok(),
            Self::Map(store) => store
                .strata
                .contains_key(&rank)
                .then(|| store.strata.range(..rank).count()),
        }
    }

    pub fn get_stratum_at_rank(&self, rank: u64) -> Option<Stratum> {
        match self {
            Self::Vector(store) => {
                let index = store.ranks.binary_search(&rank).ok()?;
                Some(store.stratum(index, rank))
            }
            Self::Map(store) => store.strata.get(&rank).map(|(d, a)| Stratum {
                rank,
                differentia: *d,
                annotation: a.clone(),
            }),
        }
    }

    /// Delete the strata at `ranks`; ranks not present are ignored.
    pub fn del_ranks(&mut self, ranks: &[u64]) {
        match self {
            Self::Vector(store) => {
                let indices: Vec<usize> = ranks
                    .iter()
                    .filter_map(|rank| store.ranks.binary_search(rank).ok())
                    .collect();
                store.remove_indices(indices);
            }
            Self::Map(store) => {
                for rank in ranks {
                    store.strata.remove(rank);
                }
            }
        }
    }

    /// Delete the strata at `ranks`, taking their column indices from
    /// `get_column_index_of_rank` instead of searching.
    ///
    /// The hook must answer for the store's state before any deletion.
    pub fn del_ranks_with_hook<F>(&mut self, ranks: &[u64], get_column_index_of_rank: F)
    where
        F: Fn(u64) -> Option<usize>,
    {
        match self {
            Self::Vector(store) => {
                let indices: Vec<usize> = ranks
                    .iter()
                    .filter_map(|&rank| get_column_index_of_rank(rank))
                    .filter(|&index| index < store.ranks.len())
                    .collect();
                store.remove_indices(indices);
            }
            Self::Map(_) => self.del_ranks(ranks),
        }
    }

    /// Retained ranks in ascending order, borrowed when the store is dense.
    pub fn retained_ranks(&self) -> Cow<'_, [u64]> {
        match self {
            Self::Vector(store) => Cow::Borrowed(&store.ranks),
            Self::Map(store) => Cow::Owned(store.strata.keys().copied().collect()),
        }
    }

    pub fn iter_retained_ranks(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        match self {
            Self::Vector(store) => Box::new(store.ranks.iter().copied()),
            Self::Map(store) => Box::new(store.strata.keys().copied()),
        }
    }

    pub fn iter_retained_differentia(&self) -> Box<dyn Iterator<Item = Differentia> + '_> {
        match self {
            Self::Vector(store) => Box::new(store.differentiae.iter().copied()),
            Self::Map(store) => Box::new(store.strata.values().map(|(d, _)| *d)),
        }
    }

    /// `(rank, differentia)` pairs from `start_column_index` onward.
    pub fn iter_rank_differentia_zip(
        &self,
        start_column_index: usize,
    ) -> Box<dyn Iterator<Item = (u64, Differentia)> + '_> {
        match self {
            Self::Vector(store) => Box::new(
                store.ranks[start_column_index.min(store.ranks.len())..]
                    .iter()
                    .copied()
                    .zip(store.differentiae[start_column_index.min(store.ranks.len())..].iter().copied()),
            ),
            Self::Map(store) => Box::new(
                store
                    .strata
                    .iter()
                    .skip(start_column_index)
                    .map(|(&rank, (d, _))| (rank, *d)),
            ),
        }
    }

    pub fn iter_retained_strata(&self) -> Box<dyn Iterator<Item = Stratum> + '_> {
        match self {
            Self::Vector(store) => Box::new(
                store
                    .ranks
                    .iter()
                    .enumerate()
                    .map(move |(index, &rank)| store.stratum(index, rank)),
            ),
            Self::Map(store) => Box::new(store.strata.iter().map(|(&rank, (d, a))| Stratum {
                rank,
                differentia: *d,
                annotation: a.clone(),
            })),
        }
    }
}

impl VectorStore {
    fn stratum(&self, index: usize, rank: u64) -> Stratum {
        Stratum {
            rank,
            differentia: self.differentiae[index],
            annotation: self.annotations.get(&rank).cloned(),
        }
    }

    fn remove_indices(&mut self, mut indices: Vec<usize>) {
        if indices.is_empty() {
            return;
        }
        indices.sort_unstable();
        indices.dedup();

        // common case: a single stratum, usually near the back
        if let [index] = indices[..] {
            let rank = self.ranks.remove(index);
            self.differentiae.remove(index);
            self.annotations.remove(&rank);
            return;
        }

        let mut doomed = indices.into_iter().peekable();
        let mut write = 0;
        for read in 0..self.ranks.len() {
            if doomed.peek() == Some(&read) {
                doomed.next();
                self.annotations.remove(&self.ranks[read]);
                continue;
            }
            self.ranks[write] = self.ranks[read];
            self.differentiae[write] = self.differentiae[read];
            write += 1;
        }
        self.ranks.truncate(write);
        self.differentiae.truncate(write);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filled(kind: StoreKind, ranks: &[u64]) -> OrderedStore {
        let mut store = OrderedStore::new(kind);
        for &rank in ranks {
            store.deposit_stratum(rank, Differentia::new(rank * 10, 64), None);
        }
        store
    }

    #[test]
    fn indexed_access_matches_between_kinds() {
        for kind in [StoreKind::Vector, StoreKind::Map] {
            let store = filled(kind, &[0, 2, 5, 9]);
            assert_eq!(store.kind(), kind);
            assert_eq!(store.num_strata_retained(), 4);
            assert_eq!(store.get_rank_at_column_index(2), Some(5));
            assert_eq!(store.get_differentia_at_column_index(3), Some(Differentia::new(90, 64)));
            assert_eq!(store.get_column_index_of_rank(9), Some(3));
            assert_eq!(store.get_column_index_of_rank(3), None);
            assert_eq!(store.get_stratum_at_rank(2).map(|s| s.rank), Some(2));
            assert_eq!(store.get_stratum_at_column_index(4), None);
            assert_eq!(store.retained_ranks().as_ref(), &[0, 2, 5, 9]);
        }
    }

    #[test]
    fn del_ranks_keeps_order() {
        for kind in [StoreKind::Vector, StoreKind::Map] {
            let mut store = filled(kind, &[0, 1, 2, 3, 4, 5]);
            store.del_ranks(&[1, 4, 7]);
            assert_eq!(store.iter_retained_ranks().collect::<Vec<_>>(), vec![0, 2, 3, 5]);
            let diffs: Vec<u64> = store.iter_retained_differentia().map(|d| d.value()).collect();
            assert_eq!(diffs, vec![0, 20, 30, 50]);
            store.del_ranks(&[3]);
            assert_eq!(store.iter_retained_ranks().collect::<Vec<_>>(), vec![0, 2, 5]);
        }
    }

    #[test]
    fn del_ranks_with_hook_uses_positions() {
        let mut store = filled(StoreKind::Vector, &[0, 4, 8, 12]);
        // ranks sit on a grid of 4, so the index is rank / 4
        store.del_ranks_with_hook(&[4, 12], |rank| Some((rank / 4) as usize));
        assert_eq!(store.iter_retained_ranks().collect::<Vec<_>>(), vec![0, 8]);
    }

    #[test]
    fn annotations_follow_their_strata() {
        for kind in [StoreKind::Vector, StoreKind::Map] {
            let mut store = OrderedStore::new(kind);
            store.deposit_stratum(0, Differentia::new(1, 8), Some(json!("root")));
            store.deposit_stratum(1, Differentia::new(2, 8), Some(json!("gone")));
            store.deposit_stratum(2, Differentia::new(3, 8), None);
            store.del_ranks(&[1]);
            let strata: Vec<Stratum> = store.iter_retained_strata().collect();
            assert_eq!(strata[0].annotation, Some(json!("root")));
            assert_eq!(strata[1].annotation, None);
            assert_eq!(strata[1].rank, 2);
        }
    }

    #[test]
    fn zip_from_start_index() {
        for kind in [StoreKind::Vector, StoreKind::Map] {
            let store = filled(kind, &[0, 3, 6]);
            let zipped: Vec<(u64, u64)> = store
                .iter_rank_differentia_zip(1)
                .map(|(r, d)| (r, d.value()))
                .collect();
            assert_eq!(zipped, vec![(3, 30), (6, 60)]);
            assert_eq!(store.iter_rank_differentia_zip(10).count(), 0);
        }
    }

    #[test]
    fn equality_ignores_backing_kind() {
        assert_eq!(filled(StoreKind::Vector, &[0, 1, 5]), filled(StoreKind::Map, &[0, 1, 5]));
        assert_ne!(filled(StoreKind::Vector, &[0, 1, 5]), filled(StoreKind::Map, &[0, 5]));
    }
}
