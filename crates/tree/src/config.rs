use crate::error::ConfigError;
use crate::record::Record;
use crate::schema::{FieldId, Schema};
use crate::value::Value;
use serde::Deserialize;

/// Engine options, addressed by field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Identity field.
    #[serde(alias = "keyField")]
    pub key_field: Option<String>,
    /// Parent-link field; null or absent marks a root.
    #[serde(alias = "pkeyField", alias = "parentKeyField")]
    pub parent_key_field: Option<String>,
    /// Precomputed "may have children" flag, trusted under partial loading.
    #[serde(alias = "hasChildField")]
    pub has_child_field: Option<String>,
    /// View mirrors the source verbatim; no tree semantics.
    pub bypass: bool,
}

impl TreeConfig {
    pub fn new(key_field: impl Into<String>, parent_key_field: impl Into<String>) -> Self {
        Self {
            key_field: Some(key_field.into()),
            parent_key_field: Some(parent_key_field.into()),
            ..Self::default()
        }
    }

    pub fn bypass() -> Self {
        Self {
            bypass: true,
            ..Self::default()
        }
    }

    pub fn with_has_child_field(mut self, field: impl Into<String>) -> Self {
        self.has_child_field = Some(field.into());
        self
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Interns the configured field names. `None` when either the key or the
    /// parent-key field is missing: the tree cannot be computed then.
    pub fn resolve(&self, schema: &mut Schema) -> Option<TreeFields> {
        let key = schema.intern(non_empty(self.key_field.as_deref())?);
        let parent = schema.intern(non_empty(self.parent_key_field.as_deref())?);
        let has_child = non_empty(self.has_child_field.as_deref()).map(|name| schema.intern(name));
        Some(TreeFields {
            key,
            parent,
            has_child,
        })
    }
}

fn non_empty(name: Option<&str>) -> Option<&str> {
    name.filter(|name| !name.is_empty())
}

/// Field accessors resolved once from a [`TreeConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeFields {
    pub key: FieldId,
    pub parent: FieldId,
    pub has_child: Option<FieldId>,
}

impl TreeFields {
    #[inline]
    pub fn key<'r>(&self, record: &'r Record) -> &'r Value {
        record.get(self.key)
    }

    #[inline]
    pub fn parent_key<'r>(&self, record: &'r Record) -> &'r Value {
        record.get(self.parent)
    }

    pub fn is_structural(&self, field: FieldId) -> bool {
        field == self.key || field == self.parent
    }
}
