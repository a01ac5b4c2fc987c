use crate::schema::{FieldId, Schema};
use crate::value::Value;

/// Arena slot of a record inside its [`SourceCollection`](crate::SourceCollection).
///
/// Ids are never reused, so a stale id simply fails to resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u32);

impl RecordId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Engine bookkeeping attached to every record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeState {
    /// Depth in the view; roots are 0. Meaningful only while visible.
    pub level: u32,
    /// Visible descendants (cumulative). `None` means "not expanded",
    /// `Some(0)` means "expanded with nothing visible below".
    pub children_count: Option<usize>,
    /// Visible parent. Non-owning; absent while the record is not in the view.
    pub parent: Option<RecordId>,
    /// Position in the source collection, refreshed before every insert pass.
    pub source_index: usize,
}

/// A source record: positional field values plus tree bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct Record {
    values: Vec<Value>,
    placeholder: bool,
    pub(crate) tree: TreeState,
}

static NULL: Value = Value::Null;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loading sentinel inserted under `parent_key` while children are pending.
    pub fn placeholder(parent_field: FieldId, parent_key: Value) -> Self {
        let mut record = Self::new()
            .with(parent_field, parent_key)
            .with(Schema::HAS_CHILDREN, Value::Bool(false));
        record.placeholder = true;
        record
    }

    pub fn with(mut self, field: FieldId, value: impl Into<Value>) -> Self {
        self.set(field, value.into());
        self
    }

    /// Returns the field value, `Null` when the field was never written.
    #[inline]
    pub fn get(&self, field: FieldId) -> &Value {
        self.values.get(field.index()).unwrap_or(&NULL)
    }

    /// Writes a field and returns the previous value.
    pub fn set(&mut self, field: FieldId, value: Value) -> Value {
        let index = field.index();
        if index >= self.values.len() {
            if value.is_null() {
                return Value::Null;
            }
            self.values.resize(index + 1, Value::Null);
        }
        std::mem::replace(&mut self.values[index], value)
    }

    pub fn opened(&self) -> bool {
        self.get(Schema::OPENED).is_truthy()
    }

    pub fn has_children(&self) -> bool {
        self.get(Schema::HAS_CHILDREN).is_truthy()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn tree(&self) -> &TreeState {
        &self.tree
    }

    pub fn level(&self) -> u32 {
        self.tree.level
    }

    pub fn children_count(&self) -> Option<usize> {
        self.tree.children_count
    }

    /// Visible descendants, treating "not expanded" as zero.
    pub fn descendants(&self) -> usize {
        self.tree.children_count.unwrap_or(0)
    }

    pub fn parent(&self) -> Option<RecordId> {
        self.tree.parent
    }

    pub fn source_index(&self) -> usize {
        self.tree.source_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_read_as_null() {
        let mut schema = Schema::new();
        let name = schema.intern("name");
        let record = Record::new();
        assert!(record.get(name).is_null());
        assert!(!record.opened());
    }

    #[test]
    fn set_returns_previous_value() {
        let mut schema = Schema::new();
        let name = schema.intern("name");
        let mut record = Record::new().with(name, "a");
        assert_eq!(record.set(name, Value::from("b")), Value::from("a"));
        assert_eq!(record.get(name), &Value::from("b"));
    }

    #[test]
    fn placeholder_reports_no_children() {
        let mut schema = Schema::new();
        let pid = schema.intern("pid");
        let record = Record::placeholder(pid, Value::from(4));
        assert!(record.is_placeholder());
        assert!(!record.has_children());
        assert_eq!(record.get(pid), &Value::Int(4));
    }
}
