//! Randomized edit streams for parity and fuzz runs.
//!
//! Keys are unique integers handed out by the generator. Parent keys point at
//! an existing record, at nothing, or at a key the generator will hand out
//! soon, so adoption of orphans gets exercised too.
//!
//! Under partial loading, expanding a node can leave placeholders in the
//! source. An op that lands on one becomes a [`TreeOp::Load`] that swaps it
//! for fresh rows, the way a loader answers the request.

use crate::Lcg;
use tree::{DataTree, MutationSink, Record, Schema, SourceCollection, TreeConfig, TreeError, Value};

pub const KEY: &str = "id";
pub const PARENT: &str = "pid";

pub fn config() -> TreeConfig {
    TreeConfig::new(KEY, PARENT)
}

pub fn row(source: &mut SourceCollection, key: i64, parent: Option<i64>, opened: bool) -> Record {
    source.make_record([
        (KEY, Value::from(key)),
        (PARENT, Value::from(parent)),
        (Schema::OPENED_NAME, Value::Bool(opened)),
    ])
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowSpec {
    pub key: i64,
    pub parent: Option<i64>,
    pub opened: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeOp {
    Insert { index: usize, rows: Vec<RowSpec> },
    Delete { index: usize, count: usize },
    Toggle { index: usize },
    Reparent { index: usize, parent: Option<i64> },
    Rekey { index: usize, key: i64 },
    /// Replaces the placeholder at `index` with `rows`.
    Load { index: usize, rows: Vec<RowSpec> },
}

/// Source of decisions for [`OpGen`].
pub trait Entropy {
    fn below(&mut self, upper: usize) -> usize;

    fn chance(&mut self, percent: usize) -> bool {
        self.below(100) < percent
    }
}

impl Entropy for Lcg {
    fn below(&mut self, upper: usize) -> usize {
        Lcg::below(self, upper)
    }
}

/// Reads decisions from raw fuzzer input; yields zeros once exhausted.
pub struct ByteEntropy<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteEntropy<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn is_exhausted(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Entropy for ByteEntropy<'_> {
    fn below(&mut self, upper: usize) -> usize {
        let Some((&byte, rest)) = self.bytes.split_first() else {
            return 0;
        };
        self.bytes = rest;
        if upper == 0 { 0 } else { byte as usize % upper }
    }
}

pub struct OpGen<E> {
    entropy: E,
    next_key: i64,
}

impl<E: Entropy> OpGen<E> {
    pub fn new(entropy: E) -> Self {
        Self {
            entropy,
            next_key: 1,
        }
    }

    pub fn entropy(&self) -> &E {
        &self.entropy
    }

    pub fn next_op(&mut self, source: &SourceCollection) -> TreeOp {
        let len = source.len();
        let pick = self.entropy.below(100);
        match pick {
            _ if len == 0 || pick < 35 => {
                let count = 1 + self.entropy.below(4);
                let mut rows: Vec<RowSpec> = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.fresh_key();
                    let parent = if !rows.is_empty() && self.entropy.chance(30) {
                        Some(rows[self.entropy.below(rows.len())].key)
                    } else {
                        self.parent_for(source)
                    };
                    rows.push(RowSpec {
                        key,
                        parent,
                        opened: self.entropy.chance(50),
                    });
                }
                if rows.len() > 1 && self.entropy.chance(50) {
                    rows.reverse();
                }
                TreeOp::Insert {
                    index: self.entropy.below(len + 1),
                    rows,
                }
            }
            _ if pick < 55 => {
                let index = self.entropy.below(len);
                let count = 1 + self.entropy.below(3.min(len - index));
                TreeOp::Delete { index, count }
            }
            _ => {
                let index = self.entropy.below(len);
                if let Some(parent) = placeholder_parent(source, index) {
                    return self.load(index, parent);
                }
                if pick < 85 {
                    TreeOp::Toggle { index }
                } else if pick < 95 {
                    TreeOp::Reparent {
                        index,
                        parent: self.parent_for(source),
                    }
                } else {
                    TreeOp::Rekey {
                        index,
                        key: self.fresh_key(),
                    }
                }
            }
        }
    }

    fn load(&mut self, index: usize, parent: Option<i64>) -> TreeOp {
        let count = self.entropy.below(3);
        let rows = (0..count)
            .map(|_| RowSpec {
                key: self.fresh_key(),
                parent,
                opened: self.entropy.chance(30),
            })
            .collect();
        TreeOp::Load { index, rows }
    }

    fn fresh_key(&mut self) -> i64 {
        let key = self.next_key;
        self.next_key += 1;
        key
    }

    fn parent_for(&mut self, source: &SourceCollection) -> Option<i64> {
        let roll = self.entropy.below(10);
        if roll < 3 || source.is_empty() {
            return None;
        }
        if roll < 5 {
            // Dangling for now; one of the next keys handed out.
            return Some(self.next_key + self.entropy.below(3) as i64);
        }
        let index = self.entropy.below(source.len());
        let key = source.schema().lookup(KEY)?;
        source.record_at(index)?.get(key).as_int()
    }
}

/// Parent key of the placeholder at `index`, if that row is one.
fn placeholder_parent(source: &SourceCollection, index: usize) -> Option<Option<i64>> {
    let record = source.record_at(index).filter(|record| record.is_placeholder())?;
    let parent = source.schema().lookup(PARENT).map(|field| record.get(field).as_int());
    Some(parent.flatten())
}

/// Applies `op` to `tree` through its index-based API.
pub fn apply<S: MutationSink + ?Sized>(tree: &mut DataTree, op: &TreeOp, sink: &mut S) -> Result<(), TreeError> {
    let len = tree.source().len();
    match op {
        TreeOp::Insert { index, rows } => {
            let records = records(tree, rows);
            tree.splice((*index).min(len), 0, records, sink)
        }
        TreeOp::Load { index, rows } => {
            let records = records(tree, rows);
            let index = (*index).min(len);
            tree.splice(index, 1.min(len - index), records, sink)
        }
        TreeOp::Delete { index, count } => {
            let index = (*index).min(len);
            tree.splice(index, (*count).min(len - index), Vec::new(), sink)
        }
        TreeOp::Toggle { index } => {
            let opened = tree
                .source()
                .record_at(*index)
                .is_some_and(Record::opened);
            tree.set_opened(*index, !opened, sink)
        }
        TreeOp::Reparent { index, parent } => {
            let field = tree.field(PARENT);
            tree.set_field(*index, field, Value::from(*parent), sink)
        }
        TreeOp::Rekey { index, key } => {
            let field = tree.field(KEY);
            tree.set_field(*index, field, Value::Int(*key), sink)
        }
    }
}

fn records(tree: &mut DataTree, rows: &[RowSpec]) -> Vec<Record> {
    rows.iter()
        .map(|new_row| row(tree.source_mut(), new_row.key, new_row.parent, new_row.opened))
        .collect()
}
