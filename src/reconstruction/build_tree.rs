use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::column::HereditaryStratigraphicArtifact;
use crate::errors::{HstratError, Result};

use super::trie::{SearchStrategy, Searchtable, TrieRow};

/// Tree reconstruction algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeAlgorithm {
    /// Trie insertion with an indexed descendant lookup.
    #[default]
    Searchtable,
    /// Same insertion order, subtree walk lookup. Reference path.
    NaiveTrie,
}

impl TreeAlgorithm {
    fn search_strategy(self) -> SearchStrategy {
        match self {
            Self::Searchtable => SearchStrategy::Indexed,
            Self::NaiveTrie => SearchStrategy::Naive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildTreeConfig {
    /// Join independent roots under a virtual root at origin time 0 instead
    /// of failing.
    pub force_common_ancestry: bool,
    /// Merge each single-child inner node into its child, the standard
    /// post-processing of the trie. Leaves, their origin times and all
    /// pairwise MRCA origin times are unchanged. Set to `false` to get the
    /// raw trie with one inner node per retained stratum.
    pub collapse_unifurcations: bool,
    pub algorithm: TreeAlgorithm,
}

impl Default for BuildTreeConfig {
    fn default() -> Self {
        Self {
            force_common_ancestry: false,
            collapse_unifurcations: true,
            algorithm: TreeAlgorithm::default(),
        }
    }
}

/// Phylogeny in alife standard form, one entry per node in each column.
///
/// Rows are in preorder: every ancestor row precedes its descendants, and a
/// root names itself as ancestor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlifeDataFrame {
    pub id: Vec<u64>,
    pub ancestor_id: Vec<u64>,
    pub origin_time: Vec<u64>,
    pub taxon_label: Vec<Option<String>>,
}

/// Row view of an [`AlifeDataFrame`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhylogenyRecord {
    pub id: u64,
    pub ancestor_id: u64,
    pub ancestor_list: String,
    pub origin_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taxon_label: Option<String>,
}

impl AlifeDataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    fn push_row(&mut self, id: u64, ancestor_id: u64, origin_time: u64, label: Option<String>) {
        self.id.push(id);
        self.ancestor_id.push(ancestor_id);
        self.origin_time.push(origin_time);
        self.taxon_label.push(label);
    }

    /// `"[<ancestor id>]"`, or `"[None]"` for a root.
    pub fn ancestor_list(&self, row: usize) -> String {
        if self.ancestor_id[row] == self.id[row] {
            "[None]".to_string()
        } else {
            format!("[{}]", self.ancestor_id[row])
        }
    }

    pub fn is_root(&self, row: usize) -> bool {
        self.ancestor_id[row] == self.id[row]
    }

    pub fn iter_records(&self) -> impl Iterator<Item = PhylogenyRecord> + '_ {
        (0..self.len()).map(move |row| PhylogenyRecord {
            id: self.id[row],
            ancestor_id: self.ancestor_id[row],
            ancestor_list: self.ancestor_list(row),
            origin_time: self.origin_time[row],
            taxon_label: self.taxon_label[row].clone(),
        })
    }

    /// Row indices of nodes carrying a taxon label, in row order.
    pub fn leaf_rows(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&row| self.taxon_label[row].is_some())
            .collect()
    }

    /// Origin time of the deepest node ancestral to both rows.
    ///
    /// Ids equal row indices, so ancestors are looked up directly.
    pub fn calc_mrca_origin_time(&self, row_a: usize, row_b: usize) -> Option<u64> {
        let lineage = |mut row: usize| {
            let mut rows = vec![row];
            while !self.is_root(row) {
                row = self.ancestor_id[row] as usize;
                rows.push(row);
            }
            rows
        };
        let lineage_a = lineage(row_a);
        lineage(row_b)
            .into_iter()
            .find(|row| lineage_a.contains(row))
            .map(|row| self.origin_time[row])
    }
}

/// Reconstruct the phylogeny of `population`.
///
/// Members are inserted shallowest first, ties in input order. Leaves are
/// labelled from `taxon_labels` by input position, or with the position
/// itself when no labels are given.
pub fn build_tree<A>(
    population: &[A],
    taxon_labels: Option<&[String]>,
    config: &BuildTreeConfig,
) -> Result<AlifeDataFrame>
where
    A: HereditaryStratigraphicArtifact + Sync,
{
    build_tree_impl(population, taxon_labels, config, &mut |_, _| {})
}

/// [`build_tree`] with the default configuration.
pub fn build_tree_searchtable<A>(
    population: &[A],
    taxon_labels: Option<&[String]>,
) -> Result<AlifeDataFrame>
where
    A: HereditaryStratigraphicArtifact + Sync,
{
    build_tree(population, taxon_labels, &BuildTreeConfig::default())
}

/// [`build_tree`], reporting `(inserted, total)` after every insertion.
pub fn build_tree_searchtable_with_progress<A, F>(
    population: &[A],
    taxon_labels: Option<&[String]>,
    config: &BuildTreeConfig,
    mut progress: F,
) -> Result<AlifeDataFrame>
where
    A: HereditaryStratigraphicArtifact + Sync,
    F: FnMut(usize, usize),
{
    build_tree_impl(population, taxon_labels, config, &mut progress)
}

fn build_tree_impl<A>(
    population: &[A],
    taxon_labels: Option<&[String]>,
    config: &BuildTreeConfig,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<AlifeDataFrame>
where
    A: HereditaryStratigraphicArtifact + Sync,
{
    let Some(first) = population.first() else {
        return Ok(AlifeDataFrame::new());
    };
    let expected = first.get_stratum_differentia_bit_width();
    if let Some(actual) = population
        .iter()
        .map(|artifact| artifact.get_stratum_differentia_bit_width())
        .find(|&width| width != expected)
    {
        return Err(HstratError::IncompatibleDifferentiaBitWidth { expected, actual });
    }
    if let Some(labels) = taxon_labels {
        if labels.len() != population.len() {
            return Err(HstratError::IndexOutOfBounds {
                index: labels.len(),
                len: population.len(),
            });
        }
    }

    // shallowest first, stable on input position; inserting a shallow member
    // after a deeper relative can attach it below the wrong branch point
    let mut order: Vec<usize> = (0..population.len()).collect();

    #[cfg(feature = "rayon")]
    order.par_sort_by_key(|&i| population[i].get_num_strata_deposited());

    #[cfg(not(feature = "rayon"))]
    order.sort_by_key(|&i| population[i].get_num_strata_deposited());

    let mut table = Searchtable::new(config.algorithm.search_strategy());
    for (done, &member) in order.iter().enumerate() {
        let artifact = &population[member];
        table.insert(
            artifact.iter_rank_differentia_zip(),
            artifact.get_num_strata_deposited().saturating_sub(1),
            member as u32,
        );
        progress(done + 1, population.len());
    }
    debug!(
        "{:?}: {} members, {} inner nodes, {} roots",
        config.algorithm,
        table.num_leaves(),
        table.num_inner_nodes(),
        table.num_root_children(),
    );

    let rows = table.emit(config.collapse_unifurcations);
    let label = |taxon: Option<u32>| {
        taxon.map(|member| match taxon_labels {
            Some(labels) => labels[member as usize].clone(),
            None => member.to_string(),
        })
    };
    to_dataframe(&rows, config.force_common_ancestry, label)
}

fn to_dataframe(
    rows: &[TrieRow],
    force_common_ancestry: bool,
    label: impl Fn(Option<u32>) -> Option<String>,
) -> Result<AlifeDataFrame> {
    let num_roots = rows.iter().filter(|row| row.parent_row.is_none()).count();
    let virtual_root = match num_roots {
        0 | 1 => false,
        _ if force_common_ancestry => true,
        _ => return Err(HstratError::MultipleRoots { num_roots }),
    };

    let offset = u64::from(virtual_root);
    let mut df = AlifeDataFrame::new();
    if virtual_root {
        df.push_row(0, 0, 0, None);
    }
    for (row_idx, row) in rows.iter().enumerate() {
        let id = row_idx as u64 + offset;
        let ancestor_id = match row.parent_row {
            Some(parent) => parent as u64 + offset,
            None if virtual_root => 0,
            None => id,
        };
        df.push_row(id, ancestor_id, row.rank, label(row.taxon));
    }
    Ok(df)
}
