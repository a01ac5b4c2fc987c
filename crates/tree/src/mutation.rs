//! Mutation descriptors exchanged with the engine.
//!
//! The same shape is consumed (source-side changes) and produced (view-side
//! changes); [`Root`] tells the two coordinate spaces apart.
//!
//! Invariants:
//! - `Segment::Row` is only ever the first segment and indexes the collection
//!   named by `root`.
//! - Splice `added`/`deleted` ids are ordered as they appear(ed) in that
//!   collection.
//! - View splices are emitted in application order; replaying them on a copy
//!   of the previous view yields the current view.

use crate::record::RecordId;
use crate::schema::FieldId;
use crate::value::Value;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Root {
    Source,
    View,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Row position inside the root collection.
    Row(usize),
    /// Record field.
    Field(FieldId),
    /// Collection-level metadata (`sorts`, `page`, ...).
    Meta(Arc<str>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationPath {
    pub root: Root,
    pub segments: Vec<Segment>,
}

impl MutationPath {
    pub fn root(root: Root) -> Self {
        Self {
            root,
            segments: Vec::new(),
        }
    }

    pub fn field(root: Root, row: usize, field: FieldId) -> Self {
        Self {
            root,
            segments: vec![Segment::Row(row), Segment::Field(field)],
        }
    }

    pub fn meta(root: Root, name: &str) -> Self {
        Self {
            root,
            segments: vec![Segment::Meta(Arc::from(name))],
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn row(&self) -> Option<usize> {
        match self.segments.first() {
            Some(Segment::Row(row)) => Some(*row),
            _ => None,
        }
    }

    /// Field directly under the row segment, if any.
    pub fn row_field(&self) -> Option<FieldId> {
        match self.segments.as_slice() {
            [Segment::Row(_), Segment::Field(field), ..] => Some(*field),
            _ => None,
        }
    }

    pub fn meta_name(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Meta(name)) => Some(name),
            _ => None,
        }
    }

    pub fn with_root(&self, root: Root) -> Self {
        Self {
            root,
            segments: self.segments.clone(),
        }
    }

    /// Rewrites the root and the row index, keeping the remaining segments.
    pub fn readdressed(&self, root: Root, row: usize) -> Self {
        let mut segments = self.segments.clone();
        if let Some(first) = segments.first_mut() {
            *first = Segment::Row(row);
        }
        Self { root, segments }
    }
}

#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Structural edit of the collection at `path`.
    Splice {
        index: usize,
        added: Vec<RecordId>,
        deleted: Vec<RecordId>,
    },
    /// Plain value write at `path`.
    Update { value: Value, previous: Value },
    /// The whole collection at `path` was replaced; consumers must re-read it.
    Replace,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    pub path: MutationPath,
    pub action: Action,
}

impl Mutation {
    pub fn splice(root: Root, index: usize, added: Vec<RecordId>, deleted: Vec<RecordId>) -> Self {
        Self {
            path: MutationPath::root(root),
            action: Action::Splice {
                index,
                added,
                deleted,
            },
        }
    }

    pub fn update(path: MutationPath, value: Value, previous: Value) -> Self {
        Self {
            path,
            action: Action::Update { value, previous },
        }
    }

    pub fn replace(root: Root) -> Self {
        Self {
            path: MutationPath::root(root),
            action: Action::Replace,
        }
    }

    pub fn root(&self) -> Root {
        self.path.root
    }

    pub fn is_splice(&self) -> bool {
        matches!(self.action, Action::Splice { .. })
    }

    pub fn added_count(&self) -> usize {
        match &self.action {
            Action::Splice { added, .. } => added.len(),
            _ => 0,
        }
    }

    pub fn deleted_count(&self) -> usize {
        match &self.action {
            Action::Splice { deleted, .. } => deleted.len(),
            _ => 0,
        }
    }

    pub(crate) fn with_path(&self, path: MutationPath) -> Self {
        Self {
            path,
            action: self.action.clone(),
        }
    }
}

/// Receiver of emitted mutations.
pub trait MutationSink {
    fn push(&mut self, mutation: Mutation);
}

impl MutationSink for Vec<Mutation> {
    fn push(&mut self, mutation: Mutation) {
        Vec::push(self, mutation);
    }
}

/// Sink that discards everything; used for silent rebuilds.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl MutationSink for NullSink {
    fn push(&mut self, _mutation: Mutation) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    #[test]
    fn readdressed_keeps_field_segments() {
        let path = MutationPath::field(Root::Source, 7, Schema::OPENED);
        let moved = path.readdressed(Root::View, 2);
        assert_eq!(moved.root, Root::View);
        assert_eq!(moved.row(), Some(2));
        assert_eq!(moved.row_field(), Some(Schema::OPENED));
    }

    #[test]
    fn meta_paths_have_no_row() {
        let path = MutationPath::meta(Root::Source, "sorts");
        assert_eq!(path.row(), None);
        assert_eq!(path.meta_name(), Some("sorts"));
    }

    #[test]
    fn splice_counts() {
        let m = Mutation::splice(Root::View, 3, vec![RecordId(1), RecordId(2)], vec![RecordId(9)]);
        assert_eq!(m.added_count(), 2);
        assert_eq!(m.deleted_count(), 1);
        assert!(m.is_splice());
    }
}
