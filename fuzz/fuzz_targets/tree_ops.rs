#![no_main]

use libfuzzer_sys::fuzz_target;
use tree::invariants::check_view;
use tree::{DataTree, Mutation, SourceCollection, ViewSnapshot, ViewSnapshotOptions, build};
use tree_test_support::ViewMirror;
use tree_test_support::ops::{ByteEntropy, OpGen, apply, config};

const MAX_OPS: usize = 256;
const COUNTS: ViewSnapshotOptions = ViewSnapshotOptions { counts: true };

fuzz_target!(|data: &[u8]| {
    // First byte: full data, partial data, or partial data with a has-child field.
    let Some((&mode, data)) = data.split_first() else {
        return;
    };
    let mut source = SourceCollection::new();
    source.meta_mut().partial_data = mode % 3 != 0;
    let config = if mode % 3 == 2 {
        config().with_has_child_field("hc")
    } else {
        config()
    };
    let mut tree = DataTree::new(config, source);
    let mut mirror = ViewMirror::new(tree.view());
    let mut generator = OpGen::new(ByteEntropy::new(data));
    let mut emitted: Vec<Mutation> = Vec::new();

    for _ in 0..MAX_OPS {
        if generator.entropy().is_exhausted() {
            break;
        }
        let op = generator.next_op(tree.source());
        emitted.clear();
        if apply(&mut tree, &op, &mut emitted).is_ok() {
            tree.run_deferred(&mut emitted);
        }

        if let Err(err) = mirror.replay(&emitted, tree.view()) {
            panic!("{err} after {op:?}");
        }
        assert_eq!(mirror.rows(), tree.view().rows(), "replayed splices diverged after {op:?}");

        let fields = *tree.fields().expect("fuzz config resolves");
        if let Err(violation) = check_view(tree.source(), tree.view(), &fields) {
            panic!("{violation} after {op:?}");
        }
        let mut source = tree.source().clone();
        let view = build(&mut source, &fields);
        let expected = ViewSnapshot::capture(&source, &view, Some(fields.key), COUNTS);
        assert_eq!(tree.snapshot(COUNTS), expected, "rebuild diverged after {op:?}");
    }
});
