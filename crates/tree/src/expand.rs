//! Expand/collapse of a visible node.
//!
//! Showing walks an explicit worklist instead of recursing, so deep chains of
//! opened records cannot exhaust the stack. A node's children are placed one
//! at a time with the regular sorted placement; when none of them were
//! visible before, they land as one contiguous run right after the node.

use crate::mutation::MutationSink;
use crate::patcher::{Anchor, Patcher};
use crate::record::{Record, RecordId};
use crate::value::Value;
use std::collections::HashSet;

impl<S: MutationSink + ?Sized> Patcher<'_, S> {
    /// Materializes the source children of `node` that are not yet visible,
    /// then the subtrees of those that are opened. Under partial loading a
    /// node with nothing to show gets a placeholder child in the source.
    pub(crate) fn show_children(&mut self, node: RecordId) {
        self.expand(node, true);
    }

    /// Same as [`show_children`](Self::show_children) without placeholder
    /// requests; used when structural edits re-attach opened records.
    pub(crate) fn reveal_children(&mut self, node: RecordId) {
        self.expand(node, false);
    }

    fn expand(&mut self, node: RecordId, lazy: bool) {
        let mut work = vec![node];
        while let Some(current) = work.pop() {
            let Some(index) = self.view.position(current) else {
                continue;
            };
            let Some(record) = self.source.get(current) else {
                continue;
            };
            let key = self.fields.key(record).clone();
            if key.is_null() {
                continue;
            }
            // An explicit `false` in the has-child field means nothing to load.
            let wants_placeholder = lazy
                && self.source.partial_data()
                && (self.fields.has_child.is_none() || record.has_children());
            if let Some(tree) = self.source.tree_mut(current) {
                tree.children_count.get_or_insert(0);
            }

            let visible: HashSet<RecordId> = self.view.rows().iter().copied().collect();
            let mut any_child = false;
            let mut pending_placeholder = false;
            let mut missing = Vec::new();
            for (id, child) in self.source.iter() {
                if self.fields.parent_key(child) != &key {
                    continue;
                }
                if child.is_placeholder() {
                    pending_placeholder = true;
                    continue;
                }
                any_child = true;
                if id != current && !visible.contains(&id) {
                    missing.push(id);
                }
            }

            if !any_child {
                if wants_placeholder && !pending_placeholder {
                    self.request_children(current, key);
                }
                continue;
            }

            let mut opened = Vec::new();
            for id in missing {
                self.place(id, Anchor::Node { id: current, index });
                if self.source.get(id).is_some_and(Record::opened) {
                    opened.push(id);
                }
            }
            log::trace!(
                target: "tree.expand",
                "show {current:?}: {} visible below",
                self.source.get(current).map_or(0, Record::descendants)
            );
            work.extend(opened.into_iter().rev());
        }
    }

    /// Pushes a loading placeholder under `node` into the source.
    fn request_children(&mut self, node: RecordId, key: Value) {
        let placeholder = Record::placeholder(self.fields.parent, key);
        match self.source.push(placeholder) {
            Ok(mutation) => {
                log::debug!(target: "tree.expand", "placeholder requested for {node:?}");
                self.edits.emit(mutation);
            }
            Err(err) => log::warn!(target: "tree.expand", "placeholder for {node:?} rejected: {err}"),
        }
        self.source.reindex();
    }

    /// Removes the visible block below `node` and marks it not expanded.
    pub(crate) fn hide_children(&mut self, node: RecordId) {
        let Some(index) = self.view.position(node) else {
            return;
        };
        let Some(tree) = self.source.tree_mut(node) else {
            return;
        };
        let count = tree.children_count.take().unwrap_or(0);
        let parent = tree.parent;
        if count == 0 {
            return;
        }
        for removed in self.edits.remove_range(self.view, index + 1..index + 1 + count) {
            self.forget(removed);
        }
        self.sub_from_ancestors(parent, count);
        log::trace!(target: "tree.expand", "hide {node:?}: {count} rows removed");
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::build;
    use crate::config::{TreeConfig, TreeFields};
    use crate::mutation::{Mutation, Root};
    use crate::patcher::Patcher;
    use crate::schema::Schema;
    use crate::source::SourceCollection;
    use crate::value::Value;
    use crate::view::FlatView;

    fn setup(
        rows: &[(i64, Option<i64>, bool)],
        partial: bool,
    ) -> (SourceCollection, TreeFields, FlatView) {
        setup_with(TreeConfig::new("id", "pid").with_has_child_field("hc"), rows, partial)
    }

    fn setup_with(
        config: TreeConfig,
        rows: &[(i64, Option<i64>, bool)],
        partial: bool,
    ) -> (SourceCollection, TreeFields, FlatView) {
        let mut source = SourceCollection::new();
        source.meta_mut().partial_data = partial;
        let fields = config.resolve(source.schema_mut()).unwrap();
        let records = rows
            .iter()
            .map(|&(key, parent, opened)| {
                source.make_record([
                    ("id", Value::from(key)),
                    ("pid", Value::from(parent)),
                    (Schema::OPENED_NAME, Value::Bool(opened)),
                ])
            })
            .collect();
        source.splice(0, 0, records).unwrap();
        let view = build(&mut source, &fields);
        (source, fields, view)
    }

    fn open(source: &mut SourceCollection, index: usize) {
        source.set_opened(index, true).unwrap();
    }

    #[test]
    fn show_then_hide_restores_view() {
        let (mut source, fields, mut view) = setup(
            &[(1, None, false), (2, Some(1), true), (3, Some(2), false), (4, Some(1), false)],
            false,
        );
        let before = view.clone();
        let node = source.id_at(0).unwrap();
        open(&mut source, 0);
        let mut sink: Vec<Mutation> = Vec::new();
        Patcher::new(fields, &mut source, &mut view, &mut sink).show_children(node);
        assert_eq!(view.len(), 4);
        assert_eq!(source.get(node).unwrap().children_count(), Some(3));
        assert_eq!(sink.iter().filter(|m| m.is_splice()).count(), 2);

        source.set_opened(0, false).unwrap();
        Patcher::new(fields, &mut source, &mut view, &mut sink).hide_children(node);
        assert_eq!(view, before);
        assert_eq!(source.get(node).unwrap().children_count(), None);
    }

    #[test]
    fn show_of_hidden_node_is_noop() {
        let (mut source, fields, mut view) =
            setup(&[(1, None, false), (2, Some(1), false), (3, Some(2), false)], false);
        let hidden = source.id_at(1).unwrap();
        let mut sink: Vec<Mutation> = Vec::new();
        Patcher::new(fields, &mut source, &mut view, &mut sink).show_children(hidden);
        assert_eq!(view.len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn partial_expand_without_children_requests_one_placeholder() {
        let (mut source, fields, mut view) = setup(&[(1, None, false)], true);
        let node = source.id_at(0).unwrap();
        assert!(source.get(node).unwrap().has_children());
        open(&mut source, 0);
        let mut sink: Vec<Mutation> = Vec::new();
        Patcher::new(fields, &mut source, &mut view, &mut sink).show_children(node);
        Patcher::new(fields, &mut source, &mut view, &mut sink).show_children(node);

        assert_eq!(source.len(), 2);
        let placeholder = source.record_at(1).unwrap();
        assert!(placeholder.is_placeholder());
        assert_eq!(fields.parent_key(placeholder), &Value::Int(1));
        assert_eq!(view.len(), 1);
        assert_eq!(source.get(node).unwrap().children_count(), Some(0));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].root(), Root::Source);
        assert_eq!(sink[0].added_count(), 1);
    }

    #[test]
    fn partial_expand_without_child_field_still_requests_children() {
        let (mut source, fields, mut view) = setup_with(TreeConfig::new("id", "pid"), &[(1, None, false)], true);
        let node = source.id_at(0).unwrap();
        assert!(!source.get(node).unwrap().has_children());
        open(&mut source, 0);
        let mut sink: Vec<Mutation> = Vec::new();
        Patcher::new(fields, &mut source, &mut view, &mut sink).show_children(node);
        Patcher::new(fields, &mut source, &mut view, &mut sink).show_children(node);

        assert_eq!(source.len(), 2);
        assert!(source.record_at(1).unwrap().is_placeholder());
        assert_eq!(view.len(), 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].root(), Root::Source);
    }

    #[test]
    fn partial_expand_respects_an_explicit_false_flag() {
        let mut source = SourceCollection::new();
        source.meta_mut().partial_data = true;
        let fields = TreeConfig::new("id", "pid")
            .with_has_child_field("hc")
            .resolve(source.schema_mut())
            .unwrap();
        let leaf = source.make_record([
            ("id", Value::from(1)),
            ("hc", Value::Bool(false)),
            (Schema::OPENED_NAME, Value::Bool(false)),
        ]);
        source.splice(0, 0, vec![leaf]).unwrap();
        let mut view = build(&mut source, &fields);
        let node = source.id_at(0).unwrap();
        open(&mut source, 0);
        let mut sink: Vec<Mutation> = Vec::new();
        Patcher::new(fields, &mut source, &mut view, &mut sink).show_children(node);
        assert_eq!(source.len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn full_data_expand_without_children_adds_nothing() {
        let (mut source, fields, mut view) = setup(&[(1, None, false)], false);
        let node = source.id_at(0).unwrap();
        open(&mut source, 0);
        let mut sink: Vec<Mutation> = Vec::new();
        Patcher::new(fields, &mut source, &mut view, &mut sink).show_children(node);
        assert_eq!(source.len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn hide_updates_ancestor_counts() {
        let (mut source, fields, mut view) = setup(
            &[(1, None, true), (2, Some(1), true), (3, Some(2), false), (4, Some(2), false)],
            false,
        );
        let root = source.id_at(0).unwrap();
        let middle = source.id_at(1).unwrap();
        assert_eq!(source.get(root).unwrap().descendants(), 3);
        source.set_opened(1, false).unwrap();
        let mut sink: Vec<Mutation> = Vec::new();
        Patcher::new(fields, &mut source, &mut view, &mut sink).hide_children(middle);
        assert_eq!(source.get(root).unwrap().descendants(), 1);
        assert_eq!(view.len(), 2);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].deleted_count(), 2);
    }
}
