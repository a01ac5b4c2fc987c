//! # tree
//!
//! Incremental tree flattening for keyed record collections.
//!
//! A [`SourceCollection`] holds flat records linked by a key field and a
//! parent-key field. A [`FlatView`] lists the records that are currently
//! visible under the per-record `opened` flags, in depth-first pre-order.
//! [`DataTree`] keeps the two in sync: source mutations are patched into the
//! view with range edits instead of rebuilding it, and every view edit is
//! reported to a [`MutationSink`] in view coordinates.
//!
//! Invariants maintained after every completed operation:
//! - A visible record's ancestors are visible, opened, and precede it.
//! - A parent's visible descendants form one contiguous block right after it.
//! - `level` is the parent's level plus one; visible roots sit at level 0.
//! - `descendants()` equals the number of view rows nested under the record.
//! - Closed records have no visible descendants.
//! - Every view row is a live, non-placeholder source record.

pub mod builder;
pub mod config;
pub mod data_tree;
pub mod error;
#[cfg(any(test, feature = "tree-invariants"))]
pub mod invariants;
pub mod mutation;
pub mod record;
pub mod schema;
pub mod sequencer;
pub mod snapshot;
pub mod source;
pub mod translate;
pub mod value;
pub mod view;

mod expand;
mod patcher;
mod scheduler;

pub use crate::builder::build;
pub use crate::config::{TreeConfig, TreeFields};
pub use crate::data_tree::DataTree;
pub use crate::error::{ConfigError, TreeError};
pub use crate::mutation::{Action, Mutation, MutationPath, MutationSink, NullSink, Root, Segment};
pub use crate::record::{Record, RecordId, TreeState};
pub use crate::scheduler::{DeferredQueue, DeferredTask};
pub use crate::schema::{FieldId, Schema};
pub use crate::sequencer::sequence;
pub use crate::snapshot::{ViewRow, ViewSnapshot, ViewSnapshotOptions};
pub use crate::source::{CollectionMeta, PageInfo, SourceCollection};
pub use crate::value::Value;
pub use crate::view::FlatView;
