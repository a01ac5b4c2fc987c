use std::fs;
use std::path::PathBuf;
use tree::{Action, Mutation, NullSink, Root};
use tree_test_support::scenario::Scenario;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> Scenario {
    let path = fixtures_dir().join(name);
    Scenario::load(&path).unwrap_or_else(|err| panic!("{}: {err}", path.display()))
}

#[test]
fn every_fixture_replays() {
    let mut paths: Vec<PathBuf> = fs::read_dir(fixtures_dir())
        .expect("fixtures directory")
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();
    assert!(paths.len() >= 4, "expected the bundled fixtures, found {paths:?}");
    for path in paths {
        let scenario = Scenario::load(&path).unwrap_or_else(|err| panic!("{}: {err}", path.display()));
        if let Err(err) = scenario.run(&mut NullSink) {
            panic!("{}: {err}", path.display());
        }
    }
}

#[test]
fn placeholder_request_is_reported_as_a_source_splice() {
    let scenario = fixture("partial_placeholder.toml");
    let mut emitted: Vec<Mutation> = Vec::new();
    scenario.run(&mut emitted).unwrap();

    let placeholder_splices = emitted
        .iter()
        .filter(|m| m.root() == Root::Source && m.path.is_root())
        .filter(|m| matches!(&m.action, Action::Splice { added, deleted, .. } if added.len() == 1 && deleted.is_empty()))
        .count();
    assert_eq!(placeholder_splices, 1);
}

#[test]
fn caller_edits_are_not_echoed_to_the_source() {
    let scenario = fixture("forward_reference.toml");
    let mut emitted: Vec<Mutation> = Vec::new();
    scenario.run(&mut emitted).unwrap();
    assert!(emitted.iter().all(|m| m.root() == Root::View));
    // Three rows land as one run, the later insert as another.
    let splices: Vec<usize> = emitted
        .iter()
        .filter(|m| m.is_splice())
        .map(Mutation::added_count)
        .collect();
    assert_eq!(splices, vec![3, 1]);
}
