//! Field-name interning.
//!
//! Records store their fields positionally; a [`FieldId`] is the slot index of
//! an interned field name. Field names chosen by configuration are resolved to
//! ids once, so per-record access on the hot path is a plain indexed load.

use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) u32);

impl FieldId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub struct Schema {
    names: Vec<Arc<str>>,
    lookup: HashMap<Arc<str>, FieldId>,
}

impl Schema {
    /// User-controlled expand flag. Always interned first.
    pub const OPENED: FieldId = FieldId(0);
    pub const OPENED_NAME: &'static str = "_opened";
    /// Engine-computed "has or may have children" flag.
    pub const HAS_CHILDREN: FieldId = FieldId(1);
    pub const HAS_CHILDREN_NAME: &'static str = "_haschildren";

    pub fn new() -> Self {
        let mut schema = Self {
            names: Vec::new(),
            lookup: HashMap::new(),
        };
        schema.intern(Self::OPENED_NAME);
        schema.intern(Self::HAS_CHILDREN_NAME);
        schema
    }

    pub fn intern(&mut self, name: &str) -> FieldId {
        if let Some(id) = self.lookup.get(name) {
            return *id;
        }
        let id = FieldId(self.names.len() as u32);
        let name: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&name));
        self.lookup.insert(name, id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<FieldId> {
        self.lookup.get(name).copied()
    }

    pub fn name(&self, id: FieldId) -> Option<&str> {
        self.names.get(id.index()).map(|name| name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}
