use std::collections::HashMap;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::template::TemplatePhylogeny;
use crate::column::{HereditaryStratigraphicArtifact, HereditaryStratigraphicColumn, Stratum};
use crate::differentia::Differentia;
use crate::errors::{HstratError, Result};
use crate::policies::StratumRetentionPolicy;

/// How [`descend_template_phylogeny`] grows columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescendMode {
    /// Post hoc when the policy can enumerate retained ranks, naive otherwise.
    #[default]
    Auto,
    /// Deposit generation by generation along every edge.
    Naive,
    /// Generate only the strata the extant columns retain.
    Posthoc,
}

/// Grow one column per extant template node, descended from `seed_column`.
///
/// Columns come back in [`TemplatePhylogeny::iter_extant`] order. Tips that
/// share a template ancestor share the differentia that ancestor deposited.
/// Both strategies draw from `seed_column`'s RNG, so a seeded column gives
/// reproducible output.
pub fn descend_template_phylogeny<T, P>(
    template: &T,
    seed_column: &mut HereditaryStratigraphicColumn<P>,
    mode: DescendMode,
) -> Result<Vec<HereditaryStratigraphicColumn<P>>>
where
    T: TemplatePhylogeny + ?Sized,
    P: StratumRetentionPolicy,
{
    let enumerable = seed_column.get_policy().iter_retained_ranks(1).is_some();
    let posthoc = match mode {
        DescendMode::Auto => enumerable,
        DescendMode::Naive => false,
        DescendMode::Posthoc if enumerable => true,
        DescendMode::Posthoc => {
            return Err(HstratError::InvalidPolicyParam {
                param: "policy",
                value: format!(
                    "{} cannot enumerate retained ranks for post hoc descent",
                    seed_column.get_policy().algo_identifier()
                ),
            })
        }
    };
    debug!(
        "descending template with {} strategy under {}",
        if posthoc { "posthoc" } else { "naive" },
        seed_column.get_policy().algo_identifier()
    );
    if posthoc {
        descend_posthoc(template, seed_column)
    } else {
        Ok(descend_naive(template, seed_column))
    }
}

fn descend_naive<T, P>(
    template: &T,
    seed_column: &mut HereditaryStratigraphicColumn<P>,
) -> Vec<HereditaryStratigraphicColumn<P>>
where
    T: TemplatePhylogeny + ?Sized,
    P: StratumRetentionPolicy,
{
    let mut columns: HashMap<usize, HereditaryStratigraphicColumn<P>> = HashMap::new();
    for node in template.iter_descending() {
        let stem = template.get_stem_length(node);
        let parent_column = match template.get_parent(node).and_then(|p| columns.get_mut(&p)) {
            Some(column) => column,
            None => &mut *seed_column,
        };
        let column = parent_column.clone_nth_descendant(stem);
        columns.insert(node, column);
    }
    template
        .iter_extant()
        .filter_map(|node| columns.get(&node).cloned())
        .collect()
}

fn descend_posthoc<T, P>(
    template: &T,
    seed_column: &mut HereditaryStratigraphicColumn<P>,
) -> Result<Vec<HereditaryStratigraphicColumn<P>>>
where
    T: TemplatePhylogeny + ?Sized,
    P: StratumRetentionPolicy,
{
    let seed_depth = seed_column.get_num_strata_deposited();
    let bit_width = seed_column.get_stratum_differentia_bit_width();
    let mut rng = seed_column.fork_rng();

    // strata deposited through the end of each node's stem
    let mut depth: HashMap<usize, u64> = HashMap::new();
    for node in template.iter_descending() {
        let base = template
            .get_parent(node)
            .and_then(|p| depth.get(&p).copied())
            .unwrap_or(seed_depth);
        depth.insert(node, base + template.get_stem_length(node));
    }

    let tips: Vec<usize> = template.iter_extant().collect();
    let tip_depths: Vec<u64> = tips.iter().map(|tip| depth[tip]).collect();
    let policy = seed_column.get_policy().clone();
    let retained = policy.retained_ranks_at_depths(&tip_depths).ok_or_else(|| {
        HstratError::InvalidPolicyParam {
            param: "policy",
            value: format!("{} cannot enumerate retained ranks", policy.algo_identifier()),
        }
    })?;

    // keyed by the node whose stem deposited the rank; None for the seed
    let mut memo: HashMap<(Option<usize>, u64), Differentia> = HashMap::new();
    let mut columns = Vec::with_capacity(tips.len());
    for ((&tip, &tip_depth), ranks) in tips.iter().zip(&tip_depths).zip(retained) {
        let lineage = template.iter_lineage(tip);
        let lineage_depths: Vec<u64> = lineage.iter().map(|n| depth[n]).collect();
        let mut strata = Vec::with_capacity(ranks.len());
        for rank in ranks {
            if rank < seed_depth {
                if let Some(stratum) = seed_column.get_stratum_at_rank(rank) {
                    strata.push(stratum);
                    continue;
                }
            }
            let owner = (rank >= seed_depth)
                .then(|| lineage[lineage_depths.partition_point(|&d| d <= rank)]);
            let differentia = *memo
                .entry((owner, rank))
                .or_insert_with(|| Differentia::sample(bit_width, &mut rng));
            strata.push(Stratum::new(rank, differentia));
        }
        let mut column = HereditaryStratigraphicColumn::from_parts(
            policy.clone(),
            bit_width,
            strata,
            tip_depth,
            seed_column.get_store_kind(),
        )?;
        column.reseed(rng.gen());
        columns.push(column);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::{
        FixedResolutionPolicy, PerfectResolutionPolicy, RecencyProportionalPolicy,
        StochasticPolicy,
    };
    use crate::reconstruction::calc_rank_of_mrca_bounds_between;
    use crate::simulation::TemplateTree;

    fn cherry() -> TemplateTree {
        let mut tree = TemplateTree::new();
        let root = tree.add_root(3);
        let inner = tree.add_child(root, 20).unwrap();
        tree.add_child(inner, 14).unwrap();
        tree.add_child(inner, 9).unwrap();
        tree.add_child(root, 40).unwrap();
        tree
    }

    fn check_shape<P: StratumRetentionPolicy>(columns: &[HereditaryStratigraphicColumn<P>]) {
        let depths: Vec<u64> = columns.iter().map(|c| c.get_num_strata_deposited()).collect();
        assert_eq!(depths, vec![39, 34, 45]);
        // tips 0 and 1 split after rank 24, both from the rest after rank 4
        assert_eq!(calc_rank_of_mrca_bounds_between(&columns[0], &columns[1], 0.95).map(|b| b.0), Some(24));
        assert_eq!(calc_rank_of_mrca_bounds_between(&columns[0], &columns[2], 0.95).map(|b| b.0), Some(4));
    }

    #[test]
    fn naive_descent_shares_ancestral_strata() {
        let mut seed = HereditaryStratigraphicColumn::with_seed(PerfectResolutionPolicy::new(), 64, 1);
        seed.deposit_strata(1);
        let columns = descend_template_phylogeny(&cherry(), &mut seed, DescendMode::Naive).unwrap();
        check_shape(&columns);
    }

    #[test]
    fn posthoc_descent_shares_ancestral_strata() {
        let mut seed = HereditaryStratigraphicColumn::with_seed(PerfectResolutionPolicy::new(), 64, 1);
        seed.deposit_strata(1);
        let columns = descend_template_phylogeny(&cherry(), &mut seed, DescendMode::Posthoc).unwrap();
        check_shape(&columns);
        for (a, b) in seed.iter_retained_strata().zip(columns[2].iter_retained_strata()) {
            assert_eq!(a.differentia, b.differentia);
        }
    }

    #[test]
    fn posthoc_retains_policy_ranks() {
        let policy = RecencyProportionalPolicy::new(2);
        let mut seed = HereditaryStratigraphicColumn::with_seed(policy.clone(), 8, 5);
        let columns = descend_template_phylogeny(&cherry(), &mut seed, DescendMode::Auto).unwrap();
        for column in &columns {
            let expected: Vec<u64> = policy
                .iter_retained_ranks(column.get_num_strata_deposited())
                .unwrap()
                .collect();
            assert_eq!(column.iter_retained_ranks().collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn naive_and_posthoc_agree_on_ranks() {
        let policy = FixedResolutionPolicy::new(5);
        let mut seed = HereditaryStratigraphicColumn::with_seed(policy, 16, 9);
        let naive = descend_template_phylogeny(&cherry(), &mut seed.clone(), DescendMode::Naive).unwrap();
        let posthoc = descend_template_phylogeny(&cherry(), &mut seed, DescendMode::Posthoc).unwrap();
        for (a, b) in naive.iter().zip(&posthoc) {
            assert!(a.iter_retained_ranks().eq(b.iter_retained_ranks()));
        }
    }

    #[test]
    fn seeded_descent_is_reproducible() {
        let run = || {
            let mut seed = HereditaryStratigraphicColumn::with_seed(PerfectResolutionPolicy::new(), 32, 77);
            descend_template_phylogeny(&cherry(), &mut seed, DescendMode::Posthoc).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn stochastic_policy_falls_back_to_naive() {
        let mut seed = HereditaryStratigraphicColumn::with_seed(StochasticPolicy::new(0.5), 64, 2);
        assert!(descend_template_phylogeny(&cherry(), &mut seed.clone(), DescendMode::Posthoc).is_err());
        let columns = descend_template_phylogeny(&cherry(), &mut seed, DescendMode::Auto).unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[2].get_num_strata_deposited(), 44);
    }
}
