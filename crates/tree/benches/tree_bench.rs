use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use tree::{DataTree, NullSink, SourceCollection, build};
use tree_test_support::Lcg;
use tree_test_support::ops::{config, row};

const SMALL_ROWS: usize = 256;
const LARGE_ROWS: usize = 20_000;

/// Wide, moderately deep forest: every row picks a parent among the rows
/// before it, most of them opened.
fn make_source(len: usize, seed: u64) -> SourceCollection {
    let mut rng = Lcg::new(seed);
    let mut source = SourceCollection::new();
    let records = (1..=len as i64)
        .map(|key| {
            let parent = (key > 1 && rng.chance(85)).then(|| 1 + rng.below(key as usize - 1) as i64);
            row(&mut source, key, parent, rng.chance(75))
        })
        .collect();
    source.replace(records);
    source
}

fn bench_build_small(c: &mut Criterion) {
    let mut source = make_source(SMALL_ROWS, 1);
    let fields = config().resolve(source.schema_mut()).unwrap();
    c.bench_function("bench_build_small", |b| {
        b.iter_batched(
            || source.clone(),
            |mut source| black_box(build(&mut source, &fields).len()),
            BatchSize::SmallInput,
        );
    });
}

fn bench_build_large(c: &mut Criterion) {
    let mut source = make_source(LARGE_ROWS, 2);
    let fields = config().resolve(source.schema_mut()).unwrap();
    c.bench_function("bench_build_large", |b| {
        b.iter_batched(
            || source.clone(),
            |mut source| black_box(build(&mut source, &fields).len()),
            BatchSize::LargeInput,
        );
    });
}

fn bench_insert_under_open_parent(c: &mut Criterion) {
    let source = make_source(LARGE_ROWS, 3);
    let tree = DataTree::new(config(), source);
    c.bench_function("bench_insert_under_open_parent", |b| {
        b.iter_batched(
            || {
                let mut tree = DataTree::new(tree.config().clone(), tree.source().clone());
                let record = row(tree.source_mut(), LARGE_ROWS as i64 + 1, Some(1), true);
                (tree, record)
            },
            |(mut tree, record)| {
                tree.push(record, &mut NullSink).unwrap();
                black_box(tree.view().len())
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_delete_subtree_root(c: &mut Criterion) {
    let source = make_source(LARGE_ROWS, 4);
    let tree = DataTree::new(config(), source);
    c.bench_function("bench_delete_subtree_root", |b| {
        b.iter_batched(
            || DataTree::new(tree.config().clone(), tree.source().clone()),
            |mut tree| {
                tree.splice(0, 1, Vec::new(), &mut NullSink).unwrap();
                black_box(tree.view().len())
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_collapse_expand(c: &mut Criterion) {
    let source = make_source(LARGE_ROWS, 5);
    let mut tree = DataTree::new(config(), source);
    if !tree.source().record_at(0).is_some_and(|record| record.opened()) {
        tree.set_opened(0, true, &mut NullSink).unwrap();
        tree.run_deferred(&mut NullSink);
    }
    c.bench_function("bench_collapse_expand", |b| {
        b.iter(|| {
            tree.set_opened(0, false, &mut NullSink).unwrap();
            tree.run_deferred(&mut NullSink);
            tree.set_opened(0, true, &mut NullSink).unwrap();
            tree.run_deferred(&mut NullSink);
            black_box(tree.view().len());
        });
    });
}

criterion_group!(
    benches,
    bench_build_small,
    bench_build_large,
    bench_insert_under_open_parent,
    bench_delete_subtree_root,
    bench_collapse_expand
);
criterion_main!(benches);
