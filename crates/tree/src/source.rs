//! The source collection: sole owner of record lifetime.
//!
//! Records live in an arena addressed by [`RecordId`]; the collection order is
//! a separate id list. Removed records stay resolvable ("detached") until the
//! engine has processed the splice that removed them, because delete handling
//! still walks their parent links.

use crate::error::TreeError;
use crate::mutation::{Mutation, MutationPath, Root};
use crate::record::{Record, RecordId, TreeState};
use crate::schema::{FieldId, Schema};
use crate::value::Value;

/// Paging window of a partially loaded collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub offset: usize,
    pub limit: usize,
    pub total: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectionMeta {
    /// Children may not be loaded yet; `hasChildren` is trusted from a field.
    pub partial_data: bool,
    pub page: Option<PageInfo>,
}

#[derive(Clone, Debug, Default)]
pub struct SourceCollection {
    schema: Schema,
    slots: Vec<Option<Record>>,
    order: Vec<RecordId>,
    detached: Vec<RecordId>,
    meta: CollectionMeta,
}

impl SourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    /// Interns a field name.
    pub fn field(&mut self, name: &str) -> FieldId {
        self.schema.intern(name)
    }

    /// Builds a record from named fields, interning the names.
    pub fn make_record<K, V>(&mut self, fields: impl IntoIterator<Item = (K, V)>) -> Record
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        fields.into_iter().fold(Record::new(), |record, (name, value)| {
            let field = self.schema.intern(name.as_ref());
            record.with(field, value)
        })
    }

    pub fn meta(&self) -> &CollectionMeta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut CollectionMeta {
        &mut self.meta
    }

    pub fn partial_data(&self) -> bool {
        self.meta.partial_data
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ids(&self) -> &[RecordId] {
        &self.order
    }

    pub fn id_at(&self, index: usize) -> Option<RecordId> {
        self.order.get(index).copied()
    }

    pub fn index_of(&self, id: RecordId) -> Option<usize> {
        self.order.iter().position(|candidate| *candidate == id)
    }

    /// Resolves live and detached records alike.
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn record_at(&self, index: usize) -> Option<&Record> {
        self.id_at(index).and_then(|id| self.get(id))
    }

    /// Live records in collection order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record)> + '_ {
        self.order
            .iter()
            .filter_map(|&id| self.get(id).map(|record| (id, record)))
    }

    pub(crate) fn tree_mut(&mut self, id: RecordId) -> Option<&mut TreeState> {
        self.get_mut(id).map(|record| &mut record.tree)
    }

    /// Removes `delete_count` records at `index` and inserts `records` there.
    ///
    /// Returns the source-side descriptor to feed to the engine.
    pub fn splice(
        &mut self,
        index: usize,
        delete_count: usize,
        records: Vec<Record>,
    ) -> Result<Mutation, TreeError> {
        let len = self.order.len();
        if index > len || delete_count > len - index {
            return Err(TreeError::SpliceOutOfBounds {
                index,
                delete_count,
                len,
            });
        }
        let added: Vec<RecordId> = records.into_iter().map(|r| self.alloc(r)).collect();
        let deleted: Vec<RecordId> = self
            .order
            .splice(index..index + delete_count, added.iter().copied())
            .collect();
        self.detached.extend(deleted.iter().copied());
        Ok(Mutation::splice(Root::Source, index, added, deleted))
    }

    pub fn push(&mut self, record: Record) -> Result<Mutation, TreeError> {
        self.splice(self.order.len(), 0, vec![record])
    }

    /// Replaces the whole collection.
    pub fn replace(&mut self, records: Vec<Record>) -> Mutation {
        let previous = std::mem::take(&mut self.order);
        self.detached.extend(previous);
        let order: Vec<RecordId> = records.into_iter().map(|r| self.alloc(r)).collect();
        self.order = order;
        Mutation::replace(Root::Source)
    }

    /// Writes a field on the row at `index`.
    pub fn set_field(
        &mut self,
        index: usize,
        field: FieldId,
        value: Value,
    ) -> Result<Mutation, TreeError> {
        let len = self.order.len();
        let record = self
            .order
            .get(index)
            .copied()
            .and_then(|id| self.get_mut(id))
            .ok_or(TreeError::RowOutOfBounds {
                root: Root::Source,
                index,
                len,
            })?;
        let previous = record.set(field, value.clone());
        Ok(Mutation::update(
            MutationPath::field(Root::Source, index, field),
            value,
            previous,
        ))
    }

    pub fn set_opened(&mut self, index: usize, opened: bool) -> Result<Mutation, TreeError> {
        self.set_field(index, Schema::OPENED, Value::Bool(opened))
    }

    /// Refreshes every live record's `source_index`.
    pub fn reindex(&mut self) {
        for position in 0..self.order.len() {
            let id = self.order[position];
            if let Some(tree) = self.tree_mut(id) {
                tree.source_index = position;
            }
        }
    }

    /// Frees the slots of records removed since the last call.
    pub fn reclaim_detached(&mut self) {
        for id in std::mem::take(&mut self.detached) {
            if let Some(slot) = self.slots.get_mut(id.index()) {
                *slot = None;
            }
        }
    }

    pub fn detached(&self) -> &[RecordId] {
        &self.detached
    }

    fn alloc(&mut self, record: Record) -> RecordId {
        let id = RecordId(self.slots.len() as u32);
        self.slots.push(Some(record));
        id
    }
}
