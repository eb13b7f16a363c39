use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hstrat::column::HereditaryStratigraphicColumn;
use hstrat::policies::*;
use hstrat::reconstruction::{self, BuildTreeConfig, TreeAlgorithm};
use hstrat::simulation::{descend_template_phylogeny, DescendMode, TemplateTree};
use hstrat::specimen::pop_to_specimens;
use hstrat::HereditaryStratigraphicAssemblage;

fn bench_deposit_strata_100k(c: &mut Criterion) {
    let mut group = c.benchmark_group("deposit_strata_100k");
    group.sample_size(10);

    let policies: Vec<RetentionPolicy> = vec![
        PerfectResolutionPolicy::new().into(),
        NominalResolutionPolicy::new().into(),
        FixedResolutionPolicy::new(10).into(),
        RecencyProportionalPolicy::new(10).into(),
        CurbedRecencyProportionalPolicy::new(100).into(),
        DepthProportionalTaperedPolicy::new(10).into(),
        GeometricSeqNthRootTaperedPolicy::new(4, 2).into(),
        PseudostochasticPolicy::new(1).into(),
        StochasticPolicy::new(0.5).into(),
    ];
    for policy in policies {
        group.bench_function(policy.algo_identifier(), |b| {
            b.iter(|| {
                let mut col = HereditaryStratigraphicColumn::with_seed(policy.clone(), 64, 42);
                col.deposit_strata(black_box(100_000));
                col
            });
        });
    }

    group.finish();
}

/// Full binary tree of `levels` below one root; leaves become the population.
fn binary_template(levels: u32, stem_length: u64) -> TemplateTree {
    let mut template = TemplateTree::new();
    let mut frontier = vec![template.add_root(stem_length)];
    for _ in 0..levels {
        let mut next = Vec::with_capacity(frontier.len() * 2);
        for &node in &frontier {
            for _ in 0..2 {
                if let Ok(child) = template.add_child(node, stem_length) {
                    next.push(child);
                }
            }
        }
        frontier = next;
    }
    template
}

fn descended(policy: RetentionPolicy, bit_width: u8, levels: u32) -> Vec<HereditaryStratigraphicColumn> {
    let mut seed = HereditaryStratigraphicColumn::with_seed(policy, bit_width, 42);
    descend_template_phylogeny(&binary_template(levels, 20), &mut seed, DescendMode::Auto)
        .unwrap_or_default()
}

fn bench_mrca_pairwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("mrca_pairwise");
    group.sample_size(10);

    for bit_width in [8u8, 64] {
        let population = descended(FixedResolutionPolicy::new(10).into(), bit_width, 7);
        group.bench_with_input(
            BenchmarkId::new("columns", bit_width),
            &population,
            |b, population| {
                b.iter(|| {
                    let mut total = 0u64;
                    for (i, x) in population.iter().enumerate() {
                        for y in &population[i + 1..] {
                            if let Some((lo, _)) =
                                reconstruction::calc_rank_of_mrca_bounds_between(x, y, 0.95)
                            {
                                total += lo;
                            }
                        }
                    }
                    total
                });
            },
        );

        let Ok(assemblage) = HereditaryStratigraphicAssemblage::from_specimens(&population) else {
            continue;
        };
        group.bench_with_input(
            BenchmarkId::new("assemblage_rows", bit_width),
            &assemblage,
            |b, assemblage| {
                b.iter(|| {
                    let mut total = 0u64;
                    let n = assemblage.num_specimens();
                    for i in 0..n {
                        for j in i + 1..n {
                            if let Ok(Some((lo, _))) =
                                assemblage.calc_rank_of_mrca_bounds_between_rows(i, j, 0.95)
                            {
                                total += lo;
                            }
                        }
                    }
                    total
                });
            },
        );
    }

    group.finish();
}

fn bench_build_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_tree");
    group.sample_size(10);

    let specimens = pop_to_specimens(&descended(RecencyProportionalPolicy::new(4).into(), 64, 12));
    for algorithm in [TreeAlgorithm::Searchtable, TreeAlgorithm::NaiveTrie] {
        let config = BuildTreeConfig {
            algorithm,
            ..BuildTreeConfig::default()
        };
        group.bench_function(format!("4k_tips_{algorithm:?}"), |b| {
            b.iter(|| reconstruction::build_tree(black_box(&specimens), None, &config));
        });
    }

    group.finish();
}

fn bench_descend_template(c: &mut Criterion) {
    let mut group = c.benchmark_group("descend_template");
    group.sample_size(10);

    let template = binary_template(10, 50);
    for mode in [DescendMode::Naive, DescendMode::Posthoc] {
        group.bench_function(format!("{mode:?}"), |b| {
            b.iter(|| {
                let mut seed = HereditaryStratigraphicColumn::with_seed(
                    RetentionPolicy::from(GeometricSeqNthRootTaperedPolicy::new(4, 2)),
                    64,
                    42,
                );
                descend_template_phylogeny(black_box(&template), &mut seed, mode)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_deposit_strata_100k,
    bench_mrca_pairwise,
    bench_build_tree,
    bench_descend_template
);
criterion_main!(benches);
