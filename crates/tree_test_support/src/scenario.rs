//! TOML scenario fixtures: an initial collection plus a list of steps.
//!
//! ```toml
//! [config]
//! key_field = "id"
//! parent_key_field = "pid"
//!
//! [[rows]]
//! id = 1
//! _opened = true
//!
//! [[steps]]
//! op = "splice"
//! index = 1
//! rows = [{ id = 2, pid = 1 }]
//!
//! [[steps]]
//! op = "expect"
//! view = ["1", "  2"]
//! ```
//!
//! Every step except `expect` is one mutation turn: the edit is applied and
//! the deferred expand/collapse work runs before the next step.

use crate::diff_lines;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tree::invariants::{InvariantViolation, check_view};
use tree::{
    DataTree, MutationSink, Record, SourceCollection, TreeConfig, TreeError, Value,
    ViewSnapshotOptions,
};

/// One record as written in a fixture: field name → value.
pub type Row = BTreeMap<String, Value>;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScenarioConfig {
    #[serde(flatten)]
    pub tree: TreeConfig,
    #[serde(default, alias = "partialData")]
    pub partial_data: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Splice {
        index: usize,
        #[serde(default)]
        delete: usize,
        #[serde(default)]
        rows: Vec<Row>,
    },
    Replace {
        rows: Vec<Row>,
    },
    /// Source row `row`.
    Set {
        row: usize,
        field: String,
        value: Value,
    },
    /// View row `row`.
    SetView {
        row: usize,
        field: String,
        value: Value,
    },
    Open {
        row: usize,
    },
    Close {
        row: usize,
    },
    Expect {
        view: Vec<String>,
        #[serde(default)]
        counts: bool,
        #[serde(default)]
        source_len: Option<usize>,
    },
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: ScenarioConfig,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed scenario: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("step {step}: {source}")]
    Tree { step: usize, source: TreeError },
    #[error("step {step}: view mismatch\n{diff}")]
    Mismatch { step: usize, diff: String },
    #[error("step {step}: expected {expected} source rows, found {actual}")]
    SourceLen {
        step: usize,
        expected: usize,
        actual: usize,
    },
    #[error("step {step}: {violation}")]
    Invariant {
        step: usize,
        violation: InvariantViolation,
    },
}

impl Scenario {
    pub fn from_toml_str(input: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Initial source collection with the scenario's metadata applied.
    pub fn source(&self) -> SourceCollection {
        let mut source = SourceCollection::new();
        source.meta_mut().partial_data = self.config.partial_data;
        let records = make_records(&mut source, &self.rows);
        source.replace(records);
        source
    }

    pub fn tree(&self) -> DataTree {
        DataTree::new(self.config.tree.clone(), self.source())
    }

    /// Replays every step on a fresh tree, checking the structural
    /// invariants after each turn. Emitted mutations go to `sink`.
    pub fn run<S: MutationSink + ?Sized>(&self, sink: &mut S) -> Result<DataTree, ScenarioError> {
        let mut tree = self.tree();
        for (step, action) in self.steps.iter().enumerate() {
            apply_step(&mut tree, action, sink).map_err(|source| ScenarioError::Tree { step, source })?;
            tree.run_deferred(sink);
            if let Some(fields) = tree.fields() {
                check_view(tree.source(), tree.view(), fields)
                    .map_err(|violation| ScenarioError::Invariant { step, violation })?;
            }
            if let Step::Expect {
                view,
                counts,
                source_len,
            } = action
            {
                let actual = tree.snapshot(ViewSnapshotOptions { counts: *counts });
                if actual.as_lines() != view.as_slice() {
                    return Err(ScenarioError::Mismatch {
                        step,
                        diff: diff_lines(view, actual.as_lines()),
                    });
                }
                if let Some(expected) = *source_len {
                    let actual = tree.source().len();
                    if actual != expected {
                        return Err(ScenarioError::SourceLen {
                            step,
                            expected,
                            actual,
                        });
                    }
                }
            }
        }
        Ok(tree)
    }
}

pub fn make_records(source: &mut SourceCollection, rows: &[Row]) -> Vec<Record> {
    rows.iter()
        .map(|row| source.make_record(row.iter().map(|(name, value)| (name.as_str(), value.clone()))))
        .collect()
}

fn apply_step<S: MutationSink + ?Sized>(tree: &mut DataTree, step: &Step, sink: &mut S) -> Result<(), TreeError> {
    match step {
        Step::Splice { index, delete, rows } => {
            let records = make_records(tree.source_mut(), rows);
            tree.splice(*index, *delete, records, sink)
        }
        Step::Replace { rows } => {
            let records = make_records(tree.source_mut(), rows);
            tree.replace(records, sink);
            Ok(())
        }
        Step::Set { row, field, value } => {
            let field = tree.field(field);
            tree.set_field(*row, field, value.clone(), sink)
        }
        Step::SetView { row, field, value } => {
            let field = tree.field(field);
            tree.set_view_field(*row, field, value.clone(), sink)
        }
        Step::Open { row } => tree.set_opened(*row, true, sink),
        Step::Close { row } => tree.set_opened(*row, false, sink),
        Step::Expect { .. } => Ok(()),
    }
}
