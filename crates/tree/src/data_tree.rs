use crate::builder::build;
use crate::config::{TreeConfig, TreeFields};
use crate::error::TreeError;
use crate::mutation::{Action, Mutation, MutationPath, MutationSink, NullSink, Root};
use crate::patcher::Patcher;
use crate::record::{Record, RecordId};
use crate::scheduler::{DeferredQueue, DeferredTask};
use crate::schema::FieldId;
use crate::snapshot::{ViewRow, ViewSnapshot, ViewSnapshotOptions, view_rows};
use crate::source::SourceCollection;
use crate::translate;
use crate::value::Value;
use crate::view::FlatView;

/// A source collection, its flattened view, and the work queued between
/// mutation turns.
///
/// Source-side changes go through [`apply_source_mutation`](Self::apply_source_mutation)
/// (or the index-based helpers that wrap it). View edits are pushed to the
/// caller's sink in view coordinates. Expand/collapse triggered by an
/// `opened` write is queued and only runs on [`run_deferred`](Self::run_deferred).
#[derive(Debug)]
pub struct DataTree {
    config: TreeConfig,
    fields: Option<TreeFields>,
    source: SourceCollection,
    view: FlatView,
    deferred: DeferredQueue,
}

impl DataTree {
    /// Builds the initial view silently.
    pub fn new(config: TreeConfig, mut source: SourceCollection) -> Self {
        let fields = config.resolve(source.schema_mut());
        let mut tree = Self {
            config,
            fields,
            source,
            view: FlatView::new(),
            deferred: DeferredQueue::new(),
        };
        tree.rebuild(&mut NullSink);
        tree
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn fields(&self) -> Option<&TreeFields> {
        self.fields.as_ref()
    }

    pub fn source(&self) -> &SourceCollection {
        &self.source
    }

    /// Direct access for edits the caller reports itself through
    /// [`apply_source_mutation`](Self::apply_source_mutation).
    pub fn source_mut(&mut self) -> &mut SourceCollection {
        &mut self.source
    }

    pub fn view(&self) -> &FlatView {
        &self.view
    }

    pub fn view_record(&self, index: usize) -> Option<&Record> {
        self.view.get(index).and_then(|id| self.source.get(id))
    }

    pub fn pending_tasks(&self) -> usize {
        self.deferred.len()
    }

    pub fn rows(&self) -> Vec<ViewRow> {
        view_rows(&self.source, &self.view, self.fields.map(|fields| fields.key))
    }

    pub fn snapshot(&self, options: ViewSnapshotOptions) -> ViewSnapshot {
        ViewSnapshot::new(&self.rows(), options)
    }

    /// Interns a field name in the source schema.
    pub fn field(&mut self, name: &str) -> FieldId {
        self.source.field(name)
    }

    /// Replaces the configuration and rebuilds.
    pub fn configure<S: MutationSink + ?Sized>(&mut self, config: TreeConfig, sink: &mut S) {
        self.fields = config.resolve(self.source.schema_mut());
        if self.fields.is_none() && !config.bypass {
            log::warn!(target: "tree.config", "key or parent-key field missing; tree disabled");
        }
        self.config = config;
        self.deferred.clear();
        self.rebuild(sink);
    }

    /// Recomputes the view and announces it as a replace.
    pub fn rebuild<S: MutationSink + ?Sized>(&mut self, sink: &mut S) {
        if self.config.bypass {
            self.view.reset(self.source.ids().to_vec());
            self.view.set_page(self.source.meta().page);
        } else if let Some(fields) = self.fields {
            self.view = build(&mut self.source, &fields);
        } else {
            self.view.reset(Vec::new());
        }
        self.source.reclaim_detached();
        sink.push(Mutation::replace(Root::View));
    }

    pub fn splice<S: MutationSink + ?Sized>(
        &mut self,
        index: usize,
        delete_count: usize,
        records: Vec<Record>,
        sink: &mut S,
    ) -> Result<(), TreeError> {
        let mutation = self.source.splice(index, delete_count, records)?;
        self.apply_source_mutation(&mutation, sink);
        Ok(())
    }

    pub fn push<S: MutationSink + ?Sized>(&mut self, record: Record, sink: &mut S) -> Result<(), TreeError> {
        let mutation = self.source.push(record)?;
        self.apply_source_mutation(&mutation, sink);
        Ok(())
    }

    pub fn replace<S: MutationSink + ?Sized>(&mut self, records: Vec<Record>, sink: &mut S) {
        let mutation = self.source.replace(records);
        self.apply_source_mutation(&mutation, sink);
    }

    pub fn set_field<S: MutationSink + ?Sized>(
        &mut self,
        index: usize,
        field: FieldId,
        value: Value,
        sink: &mut S,
    ) -> Result<(), TreeError> {
        let mutation = self.source.set_field(index, field, value)?;
        self.apply_source_mutation(&mutation, sink);
        Ok(())
    }

    pub fn set_opened<S: MutationSink + ?Sized>(
        &mut self,
        index: usize,
        opened: bool,
        sink: &mut S,
    ) -> Result<(), TreeError> {
        let mutation = self.source.set_opened(index, opened)?;
        self.apply_source_mutation(&mutation, sink);
        Ok(())
    }

    /// Writes a field on a visible row. The view-side and source-side
    /// descriptors are both pushed to `sink`.
    pub fn set_view_field<S: MutationSink + ?Sized>(
        &mut self,
        view_index: usize,
        field: FieldId,
        value: Value,
        sink: &mut S,
    ) -> Result<(), TreeError> {
        let len = self.view.len();
        let record = self
            .view
            .get(view_index)
            .and_then(|id| self.source.get_mut(id))
            .ok_or(TreeError::RowOutOfBounds {
                root: Root::View,
                index: view_index,
                len,
            })?;
        let previous = record.set(field, value.clone());
        let mutation = Mutation::update(MutationPath::field(Root::View, view_index, field), value, previous);
        sink.push(mutation.clone());
        self.apply_view_mutation(&mutation, sink);
        Ok(())
    }

    /// Reverse path: a mutation already applied to a view row is re-addressed
    /// to the source and pushed to `sink`; `opened` writes and moves are
    /// handled as if they had come from the source.
    pub fn apply_view_mutation<S: MutationSink + ?Sized>(&mut self, mutation: &Mutation, sink: &mut S) {
        if self.config.bypass {
            sink.push(translate::bypass(mutation, Root::Source));
            return;
        }
        let Some(translated) = translate::view_to_source(mutation, &self.source, &self.view) else {
            log::trace!(target: "tree.translate", "view mutation without source row dropped");
            return;
        };
        sink.push(translated.clone());
        if let Some(fields) = self.fields {
            let task = Patcher::new(fields, &mut self.source, &mut self.view, sink)
                .apply_update(&translated, false);
            if let Some(task) = task {
                self.deferred.push(task);
            }
        }
        self.source.reclaim_detached();
    }

    /// Entry point for a mutation already applied to the source.
    pub fn apply_source_mutation<S: MutationSink + ?Sized>(&mut self, mutation: &Mutation, sink: &mut S) {
        self.view.set_page(self.source.meta().page);
        match &mutation.action {
            Action::Replace if mutation.path.is_root() => self.rebuild(sink),
            Action::Splice { index, added, deleted } if mutation.path.is_root() => {
                if self.config.bypass {
                    let rows = self.view.rows_mut();
                    let start = (*index).min(rows.len());
                    let end = (start + deleted.len()).min(rows.len());
                    rows.splice(start..end, added.iter().copied());
                    sink.push(translate::bypass(mutation, Root::View));
                } else if let Some(fields) = self.fields {
                    Patcher::new(fields, &mut self.source, &mut self.view, sink).apply_splice(added, deleted);
                } else {
                    log::trace!(target: "tree.patcher", "splice ignored: tree fields not configured");
                }
            }
            _ if mutation.path.meta_name() == Some("sorts") => {}
            _ => {
                if self.config.bypass {
                    sink.push(translate::bypass(mutation, Root::View));
                } else if let Some(fields) = self.fields {
                    let task = Patcher::new(fields, &mut self.source, &mut self.view, sink)
                        .apply_update(mutation, true);
                    if let Some(task) = task {
                        self.deferred.push(task);
                    }
                } else if let Some(translated) = translate::source_to_view(mutation, &self.source, &self.view) {
                    sink.push(translated);
                }
            }
        }
        self.source.reclaim_detached();
    }

    /// Runs the expand/collapse tasks queued by earlier turns. A task whose
    /// record was removed, or whose `opened` flag flipped back, is skipped.
    pub fn run_deferred<S: MutationSink + ?Sized>(&mut self, sink: &mut S) -> usize {
        let Some(fields) = self.fields else {
            self.deferred.clear();
            return 0;
        };
        let mut ran = 0;
        while let Some(task) = self.deferred.pop() {
            let Some(opened) = self.source.get(task.record()).map(Record::opened) else {
                continue;
            };
            let mut patcher = Patcher::new(fields, &mut self.source, &mut self.view, &mut *sink);
            match task {
                DeferredTask::ShowChildren(id) if opened => patcher.show_children(id),
                DeferredTask::HideChildren(id) if !opened => patcher.hide_children(id),
                _ => {
                    log::trace!(target: "tree.expand", "stale {task:?} skipped");
                    continue;
                }
            }
            ran += 1;
        }
        self.source.reclaim_detached();
        ran
    }

    /// Expands `id` immediately, bypassing the queue. The `opened` flag is
    /// left alone.
    pub fn show_children<S: MutationSink + ?Sized>(&mut self, id: RecordId, sink: &mut S) {
        if let Some(fields) = self.fields {
            Patcher::new(fields, &mut self.source, &mut self.view, sink).show_children(id);
        }
    }

    /// Collapses `id` immediately, bypassing the queue.
    pub fn hide_children<S: MutationSink + ?Sized>(&mut self, id: RecordId, sink: &mut S) {
        if let Some(fields) = self.fields {
            Patcher::new(fields, &mut self.source, &mut self.view, sink).hide_children(id);
        }
    }
}
