//! Incremental patching of the view from source mutations.
//!
//! Contract:
//! - The patcher only ever edits the view through [`ViewEdits`], so every
//!   structural change is reported to the sink in view coordinates and in
//!   application order.
//! - After a completed splice or move, the view equals what
//!   [`build`](crate::build) would produce for the current source and the
//!   current `opened` flags.
//! - Descendant counts are adjusted by walking `TreeState::parent` upwards;
//!   decrements saturate at zero.
//!
//! Placement rule (shared by the builder, inserts and expansion): a record is
//! inserted inside its parent's contiguous block, before the first sibling
//! with a larger `source_index`, or at the end of the block.

use crate::config::TreeFields;
use crate::mutation::{Action, Mutation, MutationPath, MutationSink, Root};
use crate::record::{Record, RecordId};
use crate::scheduler::DeferredTask;
use crate::schema::{FieldId, Schema};
use crate::sequencer::sequence;
use crate::source::SourceCollection;
use crate::translate;
use crate::value::Value;
use crate::view::{FlatView, ViewEdits, index_ranges};
use std::collections::{HashMap, HashSet};

/// Where a record hangs in the view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Anchor {
    Root,
    Node { id: RecordId, index: usize },
}

/// How `hasChildren` is decided for an inserted record.
pub(crate) enum ChildHint {
    /// Partial loading: trust the configured field, absent meaning "maybe".
    Field(FieldId),
    /// Full data: the key is some live record's parent key.
    Parents(HashSet<Value>),
}

impl ChildHint {
    pub(crate) fn compute(source: &SourceCollection, fields: &TreeFields) -> Self {
        match fields.has_child {
            Some(field) if source.partial_data() => ChildHint::Field(field),
            _ => ChildHint::Parents(
                source
                    .iter()
                    .filter(|(_, record)| !record.is_placeholder())
                    .map(|(_, record)| fields.parent_key(record))
                    .filter(|key| !key.is_null())
                    .cloned()
                    .collect(),
            ),
        }
    }

    fn has_children(&self, record: &Record, fields: &TreeFields) -> bool {
        match self {
            ChildHint::Field(field) => {
                let value = record.get(*field);
                value.is_null() || value.is_truthy()
            }
            ChildHint::Parents(parents) => {
                let key = fields.key(record);
                !key.is_null() && parents.contains(key)
            }
        }
    }
}

pub(crate) struct Patcher<'a, S: MutationSink + ?Sized> {
    pub(crate) fields: TreeFields,
    pub(crate) source: &'a mut SourceCollection,
    pub(crate) view: &'a mut FlatView,
    pub(crate) edits: ViewEdits<'a, S>,
}

impl<'a, S: MutationSink + ?Sized> Patcher<'a, S> {
    pub(crate) fn new(
        fields: TreeFields,
        source: &'a mut SourceCollection,
        view: &'a mut FlatView,
        sink: &'a mut S,
    ) -> Self {
        source.reindex();
        Self {
            fields,
            source,
            view,
            edits: ViewEdits::new(sink),
        }
    }

    /// Patches the view for a root splice of the source. `deleted` records
    /// must still resolve (detached, not yet reclaimed).
    pub(crate) fn apply_splice(&mut self, added: &[RecordId], deleted: &[RecordId]) {
        if !deleted.is_empty() {
            self.remove_records(deleted);
        }

        let touched: HashSet<Value> = added
            .iter()
            .chain(deleted)
            .filter_map(|id| self.source.get(*id))
            .map(|record| self.fields.key(record))
            .filter(|key| !key.is_null())
            .cloned()
            .collect();
        let parents: Vec<Value> = added
            .iter()
            .chain(deleted)
            .filter_map(|id| self.source.get(*id))
            .map(|record| self.fields.parent_key(record).clone())
            .collect();
        let affected = self.records_under(&touched, added);

        let hint = ChildHint::compute(self.source, &self.fields);
        self.refresh_has_children(&hint, &parents);
        self.reattach(&hint, added, affected);

        log::debug!(
            target: "tree.patcher",
            "splice: +{} -{} view_len={}",
            added.len(),
            deleted.len(),
            self.view.len()
        );
    }

    /// Handles a row-level mutation of the source and returns the
    /// expand/collapse work it calls for. With `forward`, the mutation is
    /// re-addressed to the view and emitted when its record is visible.
    pub(crate) fn apply_update(&mut self, mutation: &Mutation, forward: bool) -> Option<DeferredTask> {
        if mutation.path.meta_name().is_some() {
            if forward {
                self.edits.emit(translate::bypass(mutation, Root::View));
            }
            return None;
        }
        let id = self.source.id_at(mutation.path.row()?)?;

        let mut task = None;
        if let (Action::Update { value, previous }, Some(field), 2) = (
            &mutation.action,
            mutation.path.row_field(),
            mutation.path.segments.len(),
        ) {
            if field == Schema::OPENED {
                let opened = self.source.get(id).is_some_and(Record::opened);
                task = Some(if opened {
                    DeferredTask::ShowChildren(id)
                } else {
                    DeferredTask::HideChildren(id)
                });
            } else if self.fields.is_structural(field) && previous != value {
                self.apply_move(id, field, previous, value);
            }
        }

        if forward {
            if let Some(translated) = translate::source_to_view(mutation, self.source, self.view) {
                self.edits.emit(translated);
            }
        }
        task
    }

    /// A key or parent-key write relocates the record, and for a key write
    /// also every record resolving to the old or the new key.
    fn apply_move(&mut self, id: RecordId, field: FieldId, previous: &Value, value: &Value) {
        let hint = ChildHint::compute(self.source, &self.fields);
        self.detach(id);
        let affected = if field == self.fields.key {
            let keys: HashSet<Value> = [previous, value]
                .into_iter()
                .filter(|key| !key.is_null())
                .cloned()
                .collect();
            self.records_under(&keys, &[id])
        } else {
            self.refresh_has_children(&hint, &[previous.clone(), value.clone()]);
            Vec::new()
        };
        log::trace!(
            target: "tree.patcher",
            "move {id:?}: {previous} -> {value}, {} dependents",
            affected.len()
        );
        self.reattach(&hint, &[id], affected);
    }

    /// Live records whose parent key is in `keys`, in source order.
    fn records_under(&self, keys: &HashSet<Value>, exclude: &[RecordId]) -> Vec<RecordId> {
        if keys.is_empty() {
            return Vec::new();
        }
        let exclude: HashSet<RecordId> = exclude.iter().copied().collect();
        self.source
            .iter()
            .filter(|(id, record)| {
                !record.is_placeholder()
                    && !exclude.contains(id)
                    && keys.contains(self.fields.parent_key(record))
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Pulls `affected` out of the view and inserts it again together with
    /// `head`; shown records that are opened get their subtree back.
    fn reattach(&mut self, hint: &ChildHint, head: &[RecordId], affected: Vec<RecordId>) {
        for &id in &affected {
            self.detach(id);
        }
        let mut batch = head.to_vec();
        batch.extend(affected);
        let shown = self.insert_records(hint, &batch);
        for id in shown {
            if self.source.get(id).is_some_and(Record::opened) {
                self.reveal_children(id);
            }
        }
    }

    /// Removes the visible blocks of `deleted` in coalesced ranges, highest
    /// first, after settling the ancestors' counts.
    fn remove_records(&mut self, deleted: &[RecordId]) {
        let positions: HashMap<RecordId, usize> = self
            .view
            .rows()
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect();
        let mut blocks: Vec<(usize, usize, RecordId)> = deleted
            .iter()
            .filter_map(|id| {
                let start = *positions.get(id)?;
                let span = 1 + self.source.get(*id)?.descendants();
                Some((start, start + span, *id))
            })
            .collect();
        blocks.sort_unstable();

        let mut indices = Vec::new();
        let mut covered = 0;
        for (start, end, id) in blocks {
            if start < covered {
                continue;
            }
            covered = end;
            let parent = self.source.get(id).and_then(Record::parent);
            self.sub_from_ancestors(parent, end - start);
            indices.extend(start..end);
        }

        for range in index_ranges(indices) {
            for id in self.edits.remove_range(self.view, range) {
                self.forget(id);
            }
        }
    }

    /// Removes a visible record together with its block.
    pub(crate) fn detach(&mut self, id: RecordId) {
        let Some(index) = self.view.position(id) else {
            return;
        };
        let Some(record) = self.source.get(id) else {
            return;
        };
        let span = 1 + record.descendants();
        let parent = record.parent();
        self.sub_from_ancestors(parent, span);
        for removed in self.edits.remove_range(self.view, index..index + span) {
            self.forget(removed);
        }
    }

    /// Sequences `batch` and places every record whose anchor is open.
    /// Returns the records that made it into the view.
    pub(crate) fn insert_records(&mut self, hint: &ChildHint, batch: &[RecordId]) -> Vec<RecordId> {
        let keys: HashMap<Value, RecordId> = self
            .source
            .iter()
            .filter(|(_, record)| !record.is_placeholder())
            .map(|(id, record)| (self.fields.key(record), id))
            .filter(|(key, _)| !key.is_null())
            .map(|(key, id)| (key.clone(), id))
            .collect();

        let mut shown = Vec::new();
        for id in sequence(self.source, &self.fields, batch) {
            let Some(record) = self.source.get_mut(id) else {
                continue;
            };
            if record.is_placeholder() {
                continue;
            }
            let has_children = hint.has_children(record, &self.fields);
            record.set(Schema::HAS_CHILDREN, Value::Bool(has_children));
            let parent_key = self.fields.parent_key(record).clone();

            match self.resolve_anchor(&keys, &parent_key) {
                Some(anchor) if self.anchor_open(anchor) => {
                    self.place(id, anchor);
                    shown.push(id);
                }
                _ => self.forget(id),
            }
        }
        shown
    }

    /// `None` when the parent exists in the source but is not visible.
    fn resolve_anchor(&mut self, keys: &HashMap<Value, RecordId>, parent_key: &Value) -> Option<Anchor> {
        if parent_key.is_null() {
            return Some(Anchor::Root);
        }
        let Some(&parent) = keys.get(parent_key) else {
            log::trace!(target: "tree.patcher", "no record with key {parent_key}, placing as root");
            return Some(Anchor::Root);
        };
        let index = self.view.position(parent)?;
        self.set_has_children(parent, true);
        Some(Anchor::Node { id: parent, index })
    }

    fn anchor_open(&self, anchor: Anchor) -> bool {
        match anchor {
            Anchor::Root => true,
            Anchor::Node { id, .. } => self.source.get(id).is_some_and(Record::opened),
        }
    }

    /// Inserts `id` into the anchor's block at its sorted sibling position.
    pub(crate) fn place(&mut self, id: RecordId, anchor: Anchor) {
        let (start, parent, floor) = match anchor {
            Anchor::Root => (0, None, None),
            Anchor::Node { id: parent, index } => {
                let level = self.source.get(parent).map_or(0, Record::level);
                (index + 1, Some(parent), Some(level))
            }
        };
        let Some(record) = self.source.get(id) else {
            return;
        };
        let source_index = record.source_index();
        let opened = record.opened();

        let rows = self.view.rows();
        let mut at = start;
        while let Some(row) = rows.get(at).and_then(|row| self.source.get(*row)) {
            if floor.is_some_and(|floor| row.level() <= floor) {
                break;
            }
            if row.parent() == parent && row.source_index() > source_index {
                break;
            }
            at += 1;
        }

        let level = floor.map_or(0, |floor| floor + 1);
        if let Some(tree) = self.source.tree_mut(id) {
            tree.level = level;
            tree.parent = parent;
            tree.children_count = opened.then_some(0);
        }
        self.edits.insert(self.view, at, id);
        self.add_to_ancestors(parent, 1);
    }

    /// Clears the view bookkeeping of a record that is not (or no longer)
    /// visible.
    pub(crate) fn forget(&mut self, id: RecordId) {
        if let Some(tree) = self.source.tree_mut(id) {
            tree.level = 0;
            tree.parent = None;
            tree.children_count = None;
        }
    }

    pub(crate) fn add_to_ancestors(&mut self, start: Option<RecordId>, count: usize) {
        let mut current = start;
        while let Some(id) = current {
            let Some(tree) = self.source.tree_mut(id) else {
                break;
            };
            tree.children_count = Some(tree.children_count.unwrap_or(0) + count);
            current = tree.parent;
        }
    }

    pub(crate) fn sub_from_ancestors(&mut self, start: Option<RecordId>, count: usize) {
        let mut current = start;
        while let Some(id) = current {
            let Some(tree) = self.source.tree_mut(id) else {
                break;
            };
            tree.children_count = tree.children_count.map(|n| n.saturating_sub(count));
            current = tree.parent;
        }
    }

    /// Recomputes `hasChildren` for the records keyed by `keys`. Only the
    /// set-membership rule can change after a structural edit.
    fn refresh_has_children(&mut self, hint: &ChildHint, keys: &[Value]) {
        let ChildHint::Parents(parents) = hint else {
            return;
        };
        let wanted: HashSet<&Value> = keys.iter().filter(|key| !key.is_null()).collect();
        if wanted.is_empty() {
            return;
        }
        let targets: Vec<(RecordId, bool)> = self
            .source
            .iter()
            .filter(|(_, record)| !record.is_placeholder())
            .filter(|(_, record)| wanted.contains(self.fields.key(record)))
            .map(|(id, record)| (id, parents.contains(self.fields.key(record))))
            .collect();
        for (id, has_children) in targets {
            self.set_has_children(id, has_children);
        }
    }

    /// Writes `hasChildren` and reports the change when the record is visible.
    fn set_has_children(&mut self, id: RecordId, has_children: bool) {
        let Some(record) = self.source.get_mut(id) else {
            return;
        };
        let previous = record.set(Schema::HAS_CHILDREN, Value::Bool(has_children));
        if previous.is_truthy() == has_children {
            return;
        }
        if let Some(index) = self.view.position(id) {
            self.edits.emit(Mutation::update(
                MutationPath::field(Root::View, index, Schema::HAS_CHILDREN),
                Value::Bool(has_children),
                previous,
            ));
        }
    }
}
