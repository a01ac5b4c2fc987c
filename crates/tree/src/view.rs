//! The flattened view and its edit emitter.

use crate::mutation::{Mutation, MutationSink, Root};
use crate::record::RecordId;
use crate::source::PageInfo;
use std::ops::Range;

/// Depth-first listing of the visible records. Holds ids only; records are
/// owned by the source collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlatView {
    rows: Vec<RecordId>,
    page: Option<PageInfo>,
}

impl FlatView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(page: Option<PageInfo>) -> Self {
        Self {
            rows: Vec::new(),
            page,
        }
    }

    pub fn rows(&self) -> &[RecordId] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<RecordId> {
        self.rows.get(index).copied()
    }

    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.rows.iter().position(|row| *row == id)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.rows.contains(&id)
    }

    pub fn page(&self) -> Option<PageInfo> {
        self.page
    }

    pub fn set_page(&mut self, page: Option<PageInfo>) {
        self.page = page;
    }

    pub(crate) fn reset(&mut self, rows: Vec<RecordId>) {
        self.rows = rows;
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<RecordId> {
        &mut self.rows
    }
}

/// Applies edits to a [`FlatView`] immediately and reports them to a sink.
///
/// Single-row inserts landing right after the previous one are reported as a
/// single range splice. Any other edit or notification flushes the pending
/// run first, so the emitted stream replays to the same view. A run still
/// pending on drop is flushed then.
pub(crate) struct ViewEdits<'a, S: MutationSink + ?Sized> {
    sink: &'a mut S,
    run: Option<InsertRun>,
}

struct InsertRun {
    index: usize,
    ids: Vec<RecordId>,
}

impl<'a, S: MutationSink + ?Sized> ViewEdits<'a, S> {
    pub(crate) fn new(sink: &'a mut S) -> Self {
        Self { sink, run: None }
    }

    pub(crate) fn insert(&mut self, view: &mut FlatView, index: usize, id: RecordId) {
        view.rows.insert(index, id);
        match &mut self.run {
            Some(run) if run.index + run.ids.len() == index => run.ids.push(id),
            _ => {
                self.flush();
                self.run = Some(InsertRun {
                    index,
                    ids: vec![id],
                });
            }
        }
    }

    pub(crate) fn remove_range(&mut self, view: &mut FlatView, range: Range<usize>) -> Vec<RecordId> {
        self.flush();
        let end = range.end.min(view.rows.len());
        if range.start >= end {
            return Vec::new();
        }
        let removed: Vec<RecordId> = view.rows.drain(range.start..end).collect();
        self.sink.push(Mutation::splice(
            Root::View,
            range.start,
            Vec::new(),
            removed.clone(),
        ));
        removed
    }

    pub(crate) fn emit(&mut self, mutation: Mutation) {
        self.flush();
        self.sink.push(mutation);
    }

    pub(crate) fn flush(&mut self) {
        if let Some(run) = self.run.take() {
            self.sink
                .push(Mutation::splice(Root::View, run.index, run.ids, Vec::new()));
        }
    }
}

impl<S: MutationSink + ?Sized> Drop for ViewEdits<'_, S> {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Coalesces row indices into maximal contiguous ranges, highest first, so
/// they can be removed one after another without invalidating each other.
pub(crate) fn index_ranges(mut indices: Vec<usize>) -> Vec<Range<usize>> {
    indices.sort_unstable();
    indices.dedup();
    let mut ranges: Vec<Range<usize>> = Vec::new();
    for index in indices {
        match ranges.last_mut() {
            Some(last) if last.end == index => last.end = index + 1,
            _ => ranges.push(index..index + 1),
        }
    }
    ranges.reverse();
    ranges
}
