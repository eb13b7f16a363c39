//! Inference over populations of artifacts: pairwise juxtaposition, MRCA
//! bounds and estimates, and whole-phylogeny reconstruction.

pub mod build_tree;
pub mod estimation;
pub mod juxtaposition;
pub mod mrca;
pub mod priors;
pub mod trie;

pub use build_tree::{
    build_tree, build_tree_searchtable, build_tree_searchtable_with_progress, AlifeDataFrame,
    BuildTreeConfig, PhylogenyRecord, TreeAlgorithm,
};
pub use estimation::{
    ballpark_patristic_distance_between, ballpark_rank_of_mrca_between,
    ballpark_ranks_since_mrca_with, estimate_patristic_distance_between,
    estimate_rank_of_mrca_between, estimate_ranks_since_mrca_with, Estimator,
};
pub use juxtaposition::{
    calc_min_implausible_spurious_consecutive_differentia_collisions,
    calc_probability_differentia_collision, calc_rank_of_first_retained_disparity_between,
    calc_rank_of_last_retained_commonality_between,
    calc_ranks_since_first_retained_disparity_with,
    calc_ranks_since_last_retained_commonality_with,
    does_definitively_share_no_common_ancestor, get_nth_common_rank_between, iter_common_ranks,
    iter_ranks_of_retained_commonality_between, MIN_BISECT_DIFFERENTIA_BIT_WIDTH,
};
pub use mrca::{
    calc_pairwise_rank_of_mrca_bounds, calc_patristic_distance_bounds_between,
    calc_rank_of_mrca_bounds_among, calc_rank_of_mrca_bounds_between,
    calc_rank_of_mrca_bounds_provided_confidence_level, calc_rank_of_mrca_uncertainty_among,
    calc_rank_of_mrca_uncertainty_between, calc_ranks_since_mrca_bounds_with,
    calc_ranks_since_mrca_uncertainty_with, does_have_any_common_ancestor,
    does_share_any_common_ancestor_among,
};
pub use priors::{ArbitraryPrior, ExponentialPrior, GeometricPrior, Prior, UniformPrior};
pub use trie::{SearchStrategy, Searchtable};
