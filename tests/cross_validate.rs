//! Property-based integration tests for hstrat.
//!
//! These tests check cross-cutting contracts across the stack: every policy
//! against its own scryers, both stores against each other, and the
//! juxtaposition laws over every artifact kind.

use hstrat::column::{ColumnConfig, HereditaryStratigraphicColumn, StoreKind};
use hstrat::policies::*;
use hstrat::reconstruction::{
    calc_patristic_distance_bounds_between, calc_rank_of_first_retained_disparity_between,
    calc_rank_of_last_retained_commonality_between, calc_rank_of_mrca_bounds_between,
    calc_ranks_since_mrca_bounds_with, does_definitively_share_no_common_ancestor,
    does_have_any_common_ancestor, estimate_rank_of_mrca_between, get_nth_common_rank_between,
    iter_ranks_of_retained_commonality_between, ArbitraryPrior, Estimator, ExponentialPrior,
    GeometricPrior, Prior, UniformPrior,
};
use hstrat::specimen::col_to_specimen;
use hstrat::{HereditaryStratigraphicArtifact, HereditaryStratigraphicAssemblage};

use proptest::prelude::*;

// ─── Policy Contract ───

fn deterministic_policies() -> Vec<RetentionPolicy> {
    let mut policies: Vec<RetentionPolicy> = vec![
        PerfectResolutionPolicy::new().into(),
        NominalResolutionPolicy::new().into(),
        PseudostochasticPolicy::new(7).into(),
    ];
    for res in [1, 2, 5, 10] {
        policies.push(FixedResolutionPolicy::new(res).into());
        policies.push(DepthProportionalPolicy::new(res).into());
        policies.push(DepthProportionalTaperedPolicy::new(res).into());
        policies.push(RecencyProportionalPolicy::new(res).into());
    }
    for curb in [8, 20, 67] {
        policies.push(CurbedRecencyProportionalPolicy::new(curb).into());
    }
    for degree in [2, 3, 5] {
        for interspersal in [1, 2, 4] {
            policies.push(GeometricSeqNthRootPolicy::new(degree, interspersal).into());
        }
        policies.push(GeometricSeqNthRootTaperedPolicy::new(degree, 2).into());
    }
    policies
}

fn policy_contract(policy: &RetentionPolicy, max_n: u64) {
    let algo = policy.algo_identifier();
    let mut prev: Vec<u64> = Vec::new();
    for n in 1..=max_n {
        let ranks: Vec<u64> = policy
            .iter_retained_ranks(n)
            .unwrap_or_else(|| panic!("{algo} cannot enumerate ranks"))
            .collect();

        assert_eq!(
            policy.calc_num_strata_retained_exact(n),
            Some(ranks.len() as u64),
            "{algo}: exact count disagrees at n={n}"
        );
        assert!(
            ranks.len() as u64 <= policy.calc_num_strata_retained_upper_bound(n),
            "{algo}: upper bound violated at n={n}"
        );
        assert_eq!(ranks.first(), Some(&0), "{algo}: rank 0 dropped at n={n}");
        assert_eq!(ranks.last(), Some(&(n - 1)), "{algo}: newest rank dropped at n={n}");
        assert!(
            ranks.windows(2).all(|w| w[0] < w[1]),
            "{algo}: ranks not strictly ascending at n={n}: {ranks:?}"
        );
        for (i, &r) in ranks.iter().enumerate() {
            assert_eq!(
                policy.calc_rank_at_column_index(i, n),
                Some(r),
                "{algo}: calc_rank_at_column_index mismatch at n={n}, i={i}"
            );
        }

        // a rank once dropped never returns
        assert!(
            ranks[..ranks.len() - 1].iter().all(|r| prev.binary_search(r).is_ok()),
            "{algo}: resurrected a rank at n={n}"
        );
        prev = ranks;
    }

    let depths: Vec<u64> = (1..=max_n).rev().step_by(7).collect();
    let batched = policy.retained_ranks_at_depths(&depths).unwrap();
    for (&n, ranks) in depths.iter().zip(batched) {
        assert!(
            policy.iter_retained_ranks(n).unwrap().eq(ranks),
            "{algo}: batched ranks disagree at n={n}"
        );
    }
}

#[test]
fn deterministic_policies_honor_contract() {
    for policy in deterministic_policies() {
        policy_contract(&policy, 300);
    }
}

#[test]
fn stochastic_policy_keeps_endpoints_under_bound() {
    let policy = StochasticPolicy::new(0.3);
    assert!(policy.iter_retained_ranks(10).is_none());
    assert!(policy.calc_num_strata_retained_exact(10).is_none());
    for seed in 0..20 {
        let mut col = HereditaryStratigraphicColumn::with_seed(policy.clone(), 8, seed);
        for _ in 0..200 {
            col.deposit_stratum();
            let n = col.get_num_strata_deposited();
            let ranks: Vec<u64> = col.iter_retained_ranks().collect();
            assert_eq!(ranks.first(), Some(&0));
            assert_eq!(ranks.last(), Some(&(n - 1)));
            assert!(ranks.len() as u64 <= policy.calc_num_strata_retained_upper_bound(n));
        }
    }
}

// ─── Column Invariants ───

fn column_invariants(policy: RetentionPolicy, bit_width: u8, seed: u64, predeposits: u64) {
    let config = |store| ColumnConfig {
        differentia_bit_width: bit_width,
        store,
        seed: Some(seed),
        num_predeposits: predeposits,
        initial_stratum_annotation: None,
    };
    let col = HereditaryStratigraphicColumn::from_config(policy.clone(), config(StoreKind::Vector))
        .unwrap();
    let n = predeposits + 1;

    assert_eq!(col.get_num_strata_deposited(), n);
    assert_eq!(col.get_stratum_differentia_bit_width(), bit_width);
    if let Some(expected) = policy.iter_retained_ranks(n) {
        assert!(col.iter_retained_ranks().eq(expected), "retained ranks off policy at n={n}");
    }
    assert!(col.get_num_strata_retained() as u64 <= policy.calc_num_strata_retained_upper_bound(n));
    assert_eq!(col.has_discarded_strata(), (col.get_num_strata_retained() as u64) < n);

    for d in col.iter_retained_differentia() {
        assert!(d.fits(bit_width), "differentia {} exceeds {bit_width} bits", d.value());
    }
    for (index, stratum) in col.iter_retained_strata().enumerate() {
        assert_eq!(col.get_column_index_of_rank(stratum.rank), Some(index));
        assert_eq!(col.get_stratum_at_rank(stratum.rank), Some(stratum));
    }

    // both stores see the same stream
    let mapped =
        HereditaryStratigraphicColumn::from_config(policy, config(StoreKind::Map)).unwrap();
    assert_eq!(mapped.get_store_kind(), StoreKind::Map);
    assert_eq!(mapped, col);
}

fn any_policy() -> impl Strategy<Value = RetentionPolicy> {
    use RetentionPolicy as R;
    prop_oneof![
        Just(R::PerfectResolution(PerfectResolutionPolicy::new())),
        Just(R::NominalResolution(NominalResolutionPolicy::new())),
        (1u64..20).prop_map(|r| R::FixedResolution(FixedResolutionPolicy::new(r))),
        (1u64..10).prop_map(|r| R::DepthProportional(DepthProportionalPolicy::new(r))),
        (1u64..10).prop_map(|r| R::DepthProportionalTapered(DepthProportionalTaperedPolicy::new(r))),
        (1u64..10).prop_map(|r| R::RecencyProportional(RecencyProportionalPolicy::new(r))),
        (8u64..100).prop_map(|c| R::CurbedRecencyProportional(CurbedRecencyProportionalPolicy::new(c))),
        (1u64..5, 1u64..4).prop_map(|(d, i)| R::GeometricSeqNthRoot(GeometricSeqNthRootPolicy::new(d, i))),
        (1u64..5, 1u64..4)
            .prop_map(|(d, i)| R::GeometricSeqNthRootTapered(GeometricSeqNthRootTaperedPolicy::new(d, i))),
        any::<u64>().prop_map(|s| R::Pseudostochastic(PseudostochasticPolicy::new(s))),
        (0.0f64..=1.0).prop_map(|p| R::Stochastic(StochasticPolicy::new(p))),
    ]
}

proptest! {
    #[test]
    fn proptest_column_invariants(
        policy in any_policy(),
        seed in 0u64..1000,
        n in 0u64..400,
    ) {
        column_invariants(policy, 64, seed, n);
    }

    #[test]
    fn proptest_column_bit_widths(
        bit_width in 1u8..=64,
        seed in 0u64..1000,
        n in 0u64..100,
    ) {
        column_invariants(FixedResolutionPolicy::new(3).into(), bit_width, seed, n);
    }
}

// ─── Juxtaposition Laws ───

/// Two columns forked from a common ancestor after `shared` extra deposits.
fn relatives(
    policy: RetentionPolicy,
    seed: u64,
    shared: u64,
    extra_a: u64,
    extra_b: u64,
) -> (HereditaryStratigraphicColumn, HereditaryStratigraphicColumn, u64) {
    let mut ancestor = HereditaryStratigraphicColumn::with_seed(policy, 64, seed);
    ancestor.deposit_strata(shared);
    let mrca = ancestor.get_num_strata_deposited() - 1;
    let a = ancestor.clone_nth_descendant(extra_a);
    let b = ancestor.clone_nth_descendant(extra_b);
    (a, b, mrca)
}

proptest! {
    #[test]
    fn proptest_mrca_bounds_contain_truth(
        policy in any_policy(),
        seed in 0u64..1000,
        shared in 0u64..200,
        extra_a in 0u64..100,
        extra_b in 0u64..100,
    ) {
        let (a, b, mrca) = relatives(policy, seed, shared, extra_a, extra_b);

        let (lower, upper) = calc_rank_of_mrca_bounds_between(&a, &b, 0.95).unwrap();
        prop_assert!(lower <= mrca && mrca < upper, "{mrca} outside [{lower}, {upper})");
        prop_assert_eq!(calc_rank_of_mrca_bounds_between(&b, &a, 0.95), Some((lower, upper)));
        prop_assert!(does_have_any_common_ancestor(&a, &b, 0.95));
        prop_assert!(!does_definitively_share_no_common_ancestor(&a, &b));

        let (since_lo, since_hi) = calc_ranks_since_mrca_bounds_with(&a, &b, 0.95).unwrap();
        prop_assert!(since_lo <= extra_a && extra_a < since_hi);

        let (dist_lo, dist_hi) = calc_patristic_distance_bounds_between(&a, &b, 0.95).unwrap();
        prop_assert!(dist_lo <= extra_a + extra_b && extra_a + extra_b < dist_hi);

        let priors: [&dyn Prior; 4] = [
            &ArbitraryPrior,
            &UniformPrior,
            &ExponentialPrior::new(1.1),
            &GeometricPrior::new(1.1),
        ];
        for prior in priors {
            for estimator in [Estimator::MaximumLikelihood, Estimator::Unbiased] {
                let estimate = estimate_rank_of_mrca_between(&a, &b, estimator, prior).unwrap();
                prop_assert!(
                    lower as f64 - 1e-6 <= estimate && estimate < upper as f64,
                    "{:?}: {} outside [{}, {})", estimator, estimate, lower, upper
                );
            }
        }
    }

    #[test]
    fn proptest_commonality_precedes_disparity(
        policy in any_policy(),
        seed in 0u64..1000,
        shared in 0u64..100,
        extra_a in 0u64..50,
        extra_b in 0u64..50,
        confidence in 0.0f64..0.999,
    ) {
        let (a, b, _) = relatives(policy, seed, shared, extra_a, extra_b);
        let last = calc_rank_of_last_retained_commonality_between(&a, &b, confidence);
        let first = calc_rank_of_first_retained_disparity_between(&a, &b, confidence);
        if let (Some(last), Some(first)) = (last, first) {
            prop_assert!(last < first);
        }

        let common: Vec<u64> = iter_ranks_of_retained_commonality_between(&a, &b).collect();
        prop_assert!(common.windows(2).all(|w| w[0] < w[1]));
        for (i, &rank) in common.iter().enumerate() {
            prop_assert_eq!(get_nth_common_rank_between(&a, &b, i), Some(rank));
        }
    }

    #[test]
    fn proptest_artifact_kinds_agree(
        policy in any_policy(),
        seed in 0u64..1000,
        shared in 0u64..150,
        extra_a in 0u64..80,
        extra_b in 0u64..80,
    ) {
        let (a, b, _) = relatives(policy, seed, shared, extra_a, extra_b);
        let expected = calc_rank_of_mrca_bounds_between(&a, &b, 0.95);

        let specimens = [col_to_specimen(&a), col_to_specimen(&b)];
        prop_assert_eq!(calc_rank_of_mrca_bounds_between(&specimens[0], &specimens[1], 0.95), expected);
        prop_assert_eq!(calc_rank_of_mrca_bounds_between(&a, &specimens[1], 0.95), expected);

        let assemblage = HereditaryStratigraphicAssemblage::from_specimens(&specimens).unwrap();
        prop_assert_eq!(
            assemblage.calc_rank_of_mrca_bounds_between_rows(0, 1, 0.95).unwrap(),
            expected
        );
        let (row_a, row_b) = (assemblage.row(0).unwrap(), assemblage.row(1).unwrap());
        prop_assert_eq!(calc_rank_of_mrca_bounds_between(&row_a, &row_b, 0.95), expected);
        prop_assert_eq!(assemblage.get_specimen(1).unwrap(), specimens[1].clone());
    }
}

#[test]
fn unrelated_columns_share_nothing() {
    let a = HereditaryStratigraphicColumn::with_seed(PerfectResolutionPolicy::new(), 64, 1);
    let b = HereditaryStratigraphicColumn::with_seed(PerfectResolutionPolicy::new(), 64, 2);
    assert!(does_definitively_share_no_common_ancestor(&a, &b));
    assert!(!does_have_any_common_ancestor(&a, &b, 0.95));
    assert_eq!(calc_rank_of_mrca_bounds_between(&a, &b, 0.95), None);
}

// ─── Determinism ───

#[test]
fn column_deterministic_with_same_seed() {
    for bit_width in [1, 8, 32, 64] {
        let mut a =
            HereditaryStratigraphicColumn::with_seed(PerfectResolutionPolicy::new(), bit_width, 42);
        let mut b =
            HereditaryStratigraphicColumn::with_seed(PerfectResolutionPolicy::new(), bit_width, 42);
        a.deposit_strata(100);
        b.deposit_strata(100);

        let da: Vec<u64> = a.iter_retained_differentia().map(|d| d.value()).collect();
        let db: Vec<u64> = b.iter_retained_differentia().map(|d| d.value()).collect();
        assert_eq!(da, db, "same seed should produce identical differentiae");

        let mut ca = a.clone_descendant();
        let mut cb = b.clone_descendant();
        ca.deposit_strata(10);
        cb.deposit_strata(10);
        assert_eq!(ca, cb, "forked streams should match too");
    }
}
