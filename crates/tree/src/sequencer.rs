//! Parent-before-child ordering of an insert batch.
//!
//! Contract:
//! - The output is a permutation of the (resolvable) input ids.
//! - A record whose parent key matches another record of the same batch comes
//!   after that record.
//! - Records whose parent is not in the batch are emitted where they are met.
//! - Records still waiting after the pass (parent cycles) are flushed in the
//!   order their parent key was first waited on.
//!
//! One pass over the batch plus a pending-parent table; the input is not
//! reordered in place.

use crate::config::TreeFields;
use crate::record::RecordId;
use crate::source::SourceCollection;
use crate::value::Value;
use std::collections::{HashMap, HashSet};

pub fn sequence(source: &SourceCollection, fields: &TreeFields, batch: &[RecordId]) -> Vec<RecordId> {
    let batch_keys: HashSet<&Value> = batch
        .iter()
        .filter_map(|id| source.get(*id))
        .map(|record| fields.key(record))
        .filter(|key| !key.is_null())
        .collect();

    let mut state = SequenceState {
        source,
        fields,
        seen: HashSet::new(),
        pending: HashMap::new(),
        out: Vec::with_capacity(batch.len()),
    };
    let mut waiting: Vec<&Value> = Vec::new();

    for &id in batch {
        let Some(record) = source.get(id) else {
            continue;
        };
        let parent = fields.parent_key(record);
        if parent.is_null() || !batch_keys.contains(parent) || state.seen.contains(parent) {
            state.emit(id);
        } else {
            state
                .pending
                .entry(parent)
                .or_insert_with(|| {
                    waiting.push(parent);
                    Vec::new()
                })
                .push(id);
        }
    }

    for key in waiting {
        if let Some(ids) = state.pending.remove(key) {
            for id in ids {
                state.emit(id);
            }
        }
    }

    state.out
}

struct SequenceState<'s> {
    source: &'s SourceCollection,
    fields: &'s TreeFields,
    seen: HashSet<&'s Value>,
    pending: HashMap<&'s Value, Vec<RecordId>>,
    out: Vec<RecordId>,
}

impl<'s> SequenceState<'s> {
    /// Emits `id`, then everything that was waiting on it, depth first.
    fn emit(&mut self, id: RecordId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            self.out.push(current);
            let Some(record) = self.source.get(current) else {
                continue;
            };
            let key = self.fields.key(record);
            if key.is_null() {
                continue;
            }
            self.seen.insert(key);
            if let Some(children) = self.pending.remove(key) {
                stack.extend(children.into_iter().rev());
            }
        }
    }
}
