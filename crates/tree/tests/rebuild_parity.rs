//! Incremental patching must land on the same view a full rebuild computes,
//! and the emitted view splices must replay to that same view.
//!
//! Fast CI mode: `CI` set, small seed/budget counts.
//! Extended local mode: set `DATATREE_PARITY_SEEDS` and `DATATREE_PARITY_BUDGET`.

use tree::invariants::check_view;
use tree::{DataTree, Mutation, NullSink, SourceCollection, TreeConfig, ViewSnapshot, ViewSnapshotOptions, build};
use tree_test_support::ops::{OpGen, TreeOp, apply, config};
use tree_test_support::{Lcg, ViewMirror, diff_lines};

const DEFAULT_BUDGET_CI: usize = 300;
const DEFAULT_BUDGET_LOCAL: usize = 1500;
const DEFAULT_SEEDS_CI: usize = 50;
const DEFAULT_SEEDS_LOCAL: usize = 200;
const SEED_MIX: u64 = 0x9e3779b97f4a7c15;

const COUNTS: ViewSnapshotOptions = ViewSnapshotOptions { counts: true };

fn rebuilt(tree: &DataTree) -> ViewSnapshot {
    let fields = *tree.fields().expect("tree fields resolve");
    let mut source = tree.source().clone();
    let view = build(&mut source, &fields);
    ViewSnapshot::capture(&source, &view, Some(fields.key), COUNTS)
}

#[derive(Clone, Copy, Debug)]
enum Loading {
    Full,
    /// Partial data, `hasChildren` from parent-key membership.
    Partial,
    /// Partial data with a has-child field the rows leave unset.
    PartialWithField,
}

fn new_tree(loading: Loading) -> DataTree {
    let mut source = SourceCollection::new();
    let config: TreeConfig = match loading {
        Loading::Full => config(),
        Loading::Partial => {
            source.meta_mut().partial_data = true;
            config()
        }
        Loading::PartialWithField => {
            source.meta_mut().partial_data = true;
            config().with_has_child_field("hc")
        }
    };
    DataTree::new(config, source)
}

fn run_seed(seed: u64, budget: usize, loading: Loading) {
    let mut tree = new_tree(loading);
    let mut mirror = ViewMirror::new(tree.view());
    let mut generator = OpGen::new(Lcg::new(seed.wrapping_mul(SEED_MIX)));
    let mut history: Vec<TreeOp> = Vec::new();
    let mut emitted: Vec<Mutation> = Vec::new();
    for step in 0..budget {
        let op = generator.next_op(tree.source());
        emitted.clear();
        apply(&mut tree, &op, &mut emitted)
            .unwrap_or_else(|err| panic!("{loading:?} seed={seed} step={step} op={op:?}: {err}"));
        tree.run_deferred(&mut emitted);
        history.push(op);

        if let Err(err) = mirror.replay(&emitted, tree.view()) {
            panic!("{loading:?} seed={seed} step={step}: {err}\nlast ops: {:?}", tail(&history));
        }
        assert_eq!(
            mirror.rows(),
            tree.view().rows(),
            "{loading:?} seed={seed} step={step}: replayed splices diverged\nlast ops: {:?}",
            tail(&history)
        );

        let fields = tree.fields().expect("tree fields resolve");
        if let Err(violation) = check_view(tree.source(), tree.view(), fields) {
            panic!(
                "{loading:?} seed={seed} step={step}: {violation}\nlast ops: {:?}",
                tail(&history)
            );
        }
        let actual = tree.snapshot(COUNTS);
        let expected = rebuilt(&tree);
        if actual != expected {
            panic!(
                "{loading:?} seed={seed} step={step}: incremental view diverged from rebuild\nlast ops: {:?}\n{}",
                tail(&history),
                diff_lines(expected.as_lines(), actual.as_lines())
            );
        }
    }
}

fn tail(history: &[TreeOp]) -> &[TreeOp] {
    &history[history.len().saturating_sub(5)..]
}

#[test]
fn incremental_view_matches_rebuild() {
    let seeds = seed_count();
    let budget = run_budget();
    for seed in 0..seeds as u64 {
        run_seed(seed + 1, budget, Loading::Full);
    }
}

#[test]
fn incremental_view_matches_rebuild_under_partial_loading() {
    let seeds = (seed_count() / 2).max(1);
    let budget = run_budget();
    for seed in 0..seeds as u64 {
        let loading = if seed % 2 == 0 {
            Loading::Partial
        } else {
            Loading::PartialWithField
        };
        run_seed(seed + 1, budget, loading);
    }
}

#[test]
fn parity_holds_for_a_deep_chain() {
    let mut tree = DataTree::new(config(), SourceCollection::new());
    // 1 <- 2 <- ... <- 40, inserted leaf-first so every row starts orphaned.
    for key in (1..=40i64).rev() {
        let op = TreeOp::Insert {
            index: 0,
            rows: vec![tree_test_support::ops::RowSpec {
                key,
                parent: (key > 1).then_some(key - 1),
                opened: true,
            }],
        };
        apply(&mut tree, &op, &mut NullSink).unwrap();
        tree.run_deferred(&mut NullSink);
        assert_eq!(tree.snapshot(COUNTS), rebuilt(&tree), "after inserting {key}");
    }
    assert_eq!(tree.view().len(), 40);
    assert_eq!(tree.view_record(0).unwrap().descendants(), 39);

    apply(&mut tree, &TreeOp::Delete { index: 20, count: 1 }, &mut NullSink).unwrap();
    tree.run_deferred(&mut NullSink);
    assert_eq!(tree.snapshot(COUNTS), rebuilt(&tree));
}

fn seed_count() -> usize {
    if let Ok(value) = std::env::var("DATATREE_PARITY_SEEDS")
        && let Ok(parsed) = value.parse::<usize>()
    {
        return parsed.max(1);
    }
    if std::env::var("CI").is_ok() {
        DEFAULT_SEEDS_CI
    } else {
        DEFAULT_SEEDS_LOCAL
    }
}

fn run_budget() -> usize {
    if let Ok(value) = std::env::var("DATATREE_PARITY_BUDGET")
        && let Ok(parsed) = value.parse::<usize>()
    {
        return parsed.max(1);
    }
    if std::env::var("CI").is_ok() {
        DEFAULT_BUDGET_CI
    } else {
        DEFAULT_BUDGET_LOCAL
    }
}
