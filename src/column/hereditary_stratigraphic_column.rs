use std::sync::atomic::{AtomicU64, Ordering};

use log::trace;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::artifact::HereditaryStratigraphicArtifact;
use super::ordered_store::{OrderedStore, StoreKind};
use super::stratum::{Annotation, Stratum};
use crate::differentia::Differentia;
use crate::errors::{check_bit_width, HstratError, Result};
use crate::policies::{sorted_set_difference, RetentionPolicy, StratumRetentionPolicy};

/// Construction options for [`HereditaryStratigraphicColumn::from_config`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub differentia_bit_width: u8,
    pub store: StoreKind,
    /// Seed for the column's RNG; drawn from OS entropy when absent.
    pub seed: Option<u64>,
    /// Strata deposited on top of the initial rank-0 stratum.
    pub num_predeposits: u64,
    pub initial_stratum_annotation: Option<Annotation>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            differentia_bit_width: 64,
            store: StoreKind::Vector,
            seed: None,
            num_predeposits: 0,
            initial_stratum_annotation: None,
        }
    }
}

/// A hereditary stratigraphic column.
///
/// Maintains an ordered sequence of strata (rank + differentia pairs).
/// When a new stratum is deposited the retention policy is consulted to
/// decide which older strata to prune, keeping memory bounded according
/// to the chosen policy.
///
/// A column is never empty: construction deposits the founding stratum at
/// rank 0. The column owns its RNG; descendants fork their own stream from
/// it, so siblings cloned from one parent diverge. A plain [`Clone`] also
/// gets its own stream, so `clone()` followed by a deposit behaves like
/// [`clone_descendant`](Self::clone_descendant).
#[derive(Debug)]
pub struct HereditaryStratigraphicColumn<P: StratumRetentionPolicy = RetentionPolicy> {
    policy: P,
    differentia_bit_width: u8,
    store: OrderedStore,
    num_strata_deposited: u64,
    rng: SmallRng,
    num_clones: AtomicU64,
}

/// Odd constant spreading consecutive clone counts across the seed space.
const CLONE_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

impl<P: StratumRetentionPolicy> Clone for HereditaryStratigraphicColumn<P> {
    /// Copies the strata; the copy's RNG is seeded from this column's state
    /// and a per-column clone count, so repeated clones draw distinct streams.
    fn clone(&self) -> Self {
        let nth = self.num_clones.fetch_add(1, Ordering::Relaxed) + 1;
        let base: u64 = self.rng.clone().gen();
        Self {
            policy: self.policy.clone(),
            differentia_bit_width: self.differentia_bit_width,
            store: self.store.clone(),
            num_strata_deposited: self.num_strata_deposited,
            rng: SmallRng::seed_from_u64(base ^ nth.wrapping_mul(CLONE_SEED_STRIDE)),
            num_clones: AtomicU64::new(0),
        }
    }
}

impl<P: StratumRetentionPolicy> PartialEq for HereditaryStratigraphicColumn<P> {
    /// Compares policy, width, deposit count and retained strata. RNG state
    /// and store kind are not part of a column's identity.
    fn eq(&self, other: &Self) -> bool {
        self.policy == other.policy
            && self.differentia_bit_width == other.differentia_bit_width
            && self.num_strata_deposited == other.num_strata_deposited
            && self.store == other.store
    }
}

impl<P: StratumRetentionPolicy> HereditaryStratigraphicColumn<P> {
    /// Create a new column seeded from OS entropy.
    ///
    /// # Panics
    /// Panics if `differentia_bit_width` is outside `1..=64`.
    pub fn new(policy: P, differentia_bit_width: u8) -> Self {
        Self::with_rng(policy, differentia_bit_width, SmallRng::from_entropy())
    }

    /// Create a new column with a deterministic seed for reproducibility.
    ///
    /// # Panics
    /// Panics if `differentia_bit_width` is outside `1..=64`.
    pub fn with_seed(policy: P, differentia_bit_width: u8, seed: u64) -> Self {
        Self::with_rng(policy, differentia_bit_width, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(policy: P, differentia_bit_width: u8, rng: SmallRng) -> Self {
        assert!(
            (1..=64).contains(&differentia_bit_width),
            "differentia_bit_width must be in 1..=64, got {}",
            differentia_bit_width
        );
        Self::seeded(policy, differentia_bit_width, StoreKind::Vector, rng, None)
    }

    fn seeded(
        policy: P,
        differentia_bit_width: u8,
        store: StoreKind,
        rng: SmallRng,
        initial_stratum_annotation: Option<Annotation>,
    ) -> Self {
        let mut column = Self {
            policy,
            differentia_bit_width,
            store: OrderedStore::new(store),
            num_strata_deposited: 0,
            rng,
            num_clones: AtomicU64::new(0),
        };
        column.deposit_stratum_annotated(initial_stratum_annotation);
        column
    }

    /// Create a column from a [`ColumnConfig`].
    pub fn from_config(policy: P, config: ColumnConfig) -> Result<Self> {
        let differentia_bit_width = check_bit_width(config.differentia_bit_width)?;
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let mut column = Self::seeded(
            policy,
            differentia_bit_width,
            config.store,
            rng,
            config.initial_stratum_annotation,
        );
        column.deposit_strata(config.num_predeposits);
        Ok(column)
    }

    /// Reassemble a column from stored strata.
    ///
    /// Strata must be strictly ascending by rank, fit the bit width, and
    /// match the ranks `policy` prescribes for `num_strata_deposited` when the
    /// policy can enumerate them. The RNG is not part of the stored state and
    /// is drawn fresh; call [`reseed`](Self::reseed) for reproducibility.
    pub fn from_parts(
        policy: P,
        differentia_bit_width: u8,
        strata: Vec<Stratum>,
        num_strata_deposited: u64,
        store: StoreKind,
    ) -> Result<Self> {
        let differentia_bit_width = check_bit_width(differentia_bit_width)?;
        if num_strata_deposited == 0 || strata.is_empty() {
            return Err(HstratError::DeserializationError(
                "a column holds at least its founding stratum".into(),
            ));
        }
        if strata.len() as u64 > num_strata_deposited {
            return Err(HstratError::DeserializationError(format!(
                "{} strata retained but only {num_strata_deposited} deposited",
                strata.len()
            )));
        }
        if strata.windows(2).any(|pair| pair[0].rank >= pair[1].rank)
            || strata.last().map_or(false, |s| s.rank >= num_strata_deposited)
        {
            return Err(HstratError::DeserializationError(
                "strata ranks must be strictly ascending and below num_strata_deposited".into(),
            ));
        }
        if let Some(stratum) = strata.iter().find(|s| !s.differentia.fits(differentia_bit_width)) {
            return Err(HstratError::DeserializationError(format!(
                "differentia at rank {} exceeds {differentia_bit_width} bits",
                stratum.rank
            )));
        }
        if let Some(expected) = policy.iter_retained_ranks(num_strata_deposited) {
            if !expected.eq(strata.iter().map(|s| s.rank)) {
                return Err(HstratError::DeserializationError(format!(
                    "retained ranks disagree with {} at {num_strata_deposited} deposits",
                    policy.algo_identifier()
                )));
            }
        }

        let mut ordered = OrderedStore::new(store);
        ordered.reserve(strata.len());
        for Stratum {
            rank,
            differentia,
            annotation,
        } in strata
        {
            ordered.deposit_stratum(rank, differentia, annotation);
        }
        Ok(Self {
            policy,
            differentia_bit_width,
            store: ordered,
            num_strata_deposited,
            rng: SmallRng::from_entropy(),
            num_clones: AtomicU64::new(0),
        })
    }

    /// Split off an independent RNG stream, advancing this column's own.
    pub fn fork_rng(&mut self) -> SmallRng {
        SmallRng::seed_from_u64(self.rng.gen())
    }

    /// Restart the column's RNG stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Deposit a single new stratum.
    ///
    /// Draws a differentia, appends the stratum at rank
    /// `num_strata_deposited`, prunes whatever the policy drops, then
    /// advances the deposit counter.
    pub fn deposit_stratum(&mut self) {
        self.deposit_stratum_annotated(None);
    }

    /// As [`deposit_stratum`](Self::deposit_stratum), attaching `annotation`
    /// to the new stratum.
    pub fn deposit_stratum_annotated(&mut self, annotation: Option<Annotation>) {
        let rank = self.num_strata_deposited;
        let differentia = Differentia::sample(self.differentia_bit_width, &mut self.rng);
        self.store.deposit_stratum(rank, differentia, annotation);

        let drop_ranks =
            self.policy
                .gen_drop_ranks(rank, &self.store.retained_ranks(), &mut self.rng);
        if !drop_ranks.is_empty() {
            trace!("deposit at rank {rank} drops ranks {drop_ranks:?}");
            self.store.del_ranks(&drop_ranks);
        }
        self.num_strata_deposited += 1;
    }

    /// Deposit `num_stratum_depositions` strata in succession.
    ///
    /// When the policy can enumerate its retained ranks the final state is
    /// computed directly: stale strata are deleted in one pass and only
    /// newly-required ranks are stored. Differentiae are still drawn for every
    /// rank, so the result is identical to repeated single deposits.
    pub fn deposit_strata(&mut self, num_stratum_depositions: u64) {
        if num_stratum_depositions <= 1 {
            if num_stratum_depositions == 1 {
                self.deposit_stratum();
            }
            return;
        }

        let first_rank = self.num_strata_deposited;
        let final_count = first_rank + num_stratum_depositions;
        let Some(target) = self.policy.iter_retained_ranks(final_count) else {
            for _ in 0..num_stratum_depositions {
                self.deposit_stratum();
            }
            return;
        };
        let target: Vec<u64> = target.collect();

        let stale = {
            let retained = self.store.retained_ranks();
            let stale = sorted_set_difference(&retained, &target);
            let stale_indices: Vec<usize> = stale
                .iter()
                .filter_map(|rank| retained.binary_search(rank).ok())
                .collect();
            (stale, stale_indices)
        };
        let (stale_ranks, stale_indices) = stale;
        if !stale_ranks.is_empty() {
            trace!(
                "bulk deposit of {num_stratum_depositions} drops {} strata",
                stale_ranks.len()
            );
            self.store.del_ranks_with_hook(&stale_ranks, |rank| {
                stale_ranks
                    .binary_search(&rank)
                    .ok()
                    .map(|i| stale_indices[i])
            });
        }

        let incoming = &target[target.partition_point(|&rank| rank < first_rank)..];
        self.store.reserve(incoming.len());
        let mut incoming = incoming.iter().copied().peekable();
        for rank in first_rank..final_count {
            let differentia = Differentia::sample(self.differentia_bit_width, &mut self.rng);
            if incoming.next_if_eq(&rank).is_some() {
                self.store.deposit_stratum(rank, differentia, None);
            }
        }
        self.num_strata_deposited = final_count;
    }

    /// Fork the RNG into a copy of this column and deposit one stratum on
    /// the copy.
    pub fn clone_descendant(&mut self) -> Self {
        self.clone_nth_descendant(1)
    }

    /// Fork the RNG into a copy of this column and deposit `num_stratum_depositions`
    /// strata on the copy.
    pub fn clone_nth_descendant(&mut self, num_stratum_depositions: u64) -> Self {
        let mut descendant = self.clone();
        descendant.rng = self.fork_rng();
        descendant.deposit_strata(num_stratum_depositions);
        descendant
    }

    pub fn get_policy(&self) -> &P {
        &self.policy
    }

    pub fn get_store_kind(&self) -> StoreKind {
        self.store.kind()
    }

    /// Whether stored strata may leave out their rank because the policy
    /// can recompute it from the column index.
    pub fn can_omit_rank_in_store(&self) -> bool {
        self.policy
            .calc_rank_at_column_index(0, self.num_strata_deposited)
            .is_some()
    }

    pub fn iter_retained_strata(&self) -> impl Iterator<Item = Stratum> + '_ {
        self.store.iter_retained_strata()
    }

    pub fn get_stratum_at_column_index(&self, index: usize) -> Option<Stratum> {
        self.store.get_stratum_at_column_index(index)
    }

    /// Returns `None` if no stratum with the given rank is currently retained.
    pub fn get_stratum_at_rank(&self, rank: u64) -> Option<Stratum> {
        self.store.get_stratum_at_rank(rank)
    }
}

impl<P: StratumRetentionPolicy> HereditaryStratigraphicArtifact for HereditaryStratigraphicColumn<P> {
    fn get_num_strata_deposited(&self) -> u64 {
        self.num_strata_deposited
    }

    fn get_num_strata_retained(&self) -> usize {
        self.store.num_strata_retained()
    }

    fn get_stratum_differentia_bit_width(&self) -> u8 {
        self.differentia_bit_width
    }

    fn get_rank_at_column_index(&self, index: usize) -> Option<u64> {
        self.store.get_rank_at_column_index(index)
    }

    fn get_differentia_at_column_index(&self, index: usize) -> Option<Differentia> {
        self.store.get_differentia_at_column_index(index)
    }

    fn iter_retained_ranks(&self) -> Box<dyn Iterator<Item = u64> + '_> {
        self.store.iter_retained_ranks()
    }

    fn iter_retained_differentia(&self) -> Box<dyn Iterator<Item = Differentia> + '_> {
        self.store.iter_retained_differentia()
    }

    fn iter_rank_differentia_zip(&self) -> Box<dyn Iterator<Item = (u64, Differentia)> + '_> {
        self.store.iter_rank_differentia_zip(0)
    }

    /// Only dense stores give O(1) access by rank.
    fn has_contiguous_ranks(&self) -> bool {
        self.store.kind() == StoreKind::Vector && !self.has_discarded_strata()
    }

    fn get_column_index_of_rank(&self, rank: u64) -> Option<usize> {
        self.store.get_column_index_of_rank(rank)
    }
}
