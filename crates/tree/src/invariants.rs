//! Brute-force validation of a view against its source.
//!
//! Everything is recomputed from the view rows and the records' parent keys;
//! the incremental bookkeeping is only read, never trusted.

use crate::config::TreeFields;
use crate::record::RecordId;
use crate::source::SourceCollection;
use crate::value::Value;
use crate::view::FlatView;
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invariant {
    /// Ancestors are visible, opened, and precede the row.
    AncestorsVisible,
    /// Descendants form one contiguous block after their parent.
    Contiguous,
    /// Level is the parent's level plus one; roots are at 0.
    Level,
    /// Descendant count matches a recount.
    DescendantCount,
    /// Rows are live, unique, non-placeholder source records.
    LiveRecords,
    /// Siblings follow source order; roots are true roots.
    SiblingOrder,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvariantViolation {
    pub invariant: Invariant,
    pub row: usize,
    pub detail: String,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} violated at view row {}: {}", self.invariant, self.row, self.detail)
    }
}

impl std::error::Error for InvariantViolation {}

fn violation(invariant: Invariant, row: usize, detail: impl Into<String>) -> InvariantViolation {
    InvariantViolation {
        invariant,
        row,
        detail: detail.into(),
    }
}

pub fn check_view(
    source: &SourceCollection,
    view: &FlatView,
    fields: &TreeFields,
) -> Result<(), InvariantViolation> {
    let order: HashMap<RecordId, usize> = source
        .ids()
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();
    let keys: HashMap<&Value, RecordId> = source
        .iter()
        .filter(|(_, record)| !record.is_placeholder())
        .map(|(id, record)| (fields.key(record), id))
        .filter(|(key, _)| !key.is_null())
        .collect();

    let mut positions: HashMap<RecordId, usize> = HashMap::new();
    for (row, &id) in view.rows().iter().enumerate() {
        let Some(record) = source.get(id).filter(|_| order.contains_key(&id)) else {
            return Err(violation(Invariant::LiveRecords, row, format!("{id:?} is not a live record")));
        };
        if record.is_placeholder() {
            return Err(violation(Invariant::LiveRecords, row, "placeholder in view"));
        }
        if positions.insert(id, row).is_some() {
            return Err(violation(Invariant::LiveRecords, row, format!("{id:?} listed twice")));
        }
    }

    // Ancestor path of the current row: (record, level).
    let mut stack: Vec<(RecordId, u32)> = Vec::new();
    let mut last_sibling: HashMap<Option<RecordId>, usize> = HashMap::new();
    for (row, &id) in view.rows().iter().enumerate() {
        let Some(record) = source.get(id) else {
            continue;
        };
        let parent_key = fields.parent_key(record);
        let parent = if parent_key.is_null() {
            None
        } else {
            keys.get(parent_key).copied()
        };

        match parent {
            None => {
                if record.level() != 0 {
                    return Err(violation(Invariant::Level, row, format!("root at level {}", record.level())));
                }
                stack.clear();
            }
            Some(parent) => {
                let Some(&parent_row) = positions.get(&parent) else {
                    return Err(violation(Invariant::AncestorsVisible, row, "parent not visible"));
                };
                if parent_row >= row {
                    return Err(violation(Invariant::AncestorsVisible, row, "parent listed after child"));
                }
                let parent_record = source.get(parent);
                if !parent_record.is_some_and(|p| p.opened()) {
                    return Err(violation(Invariant::AncestorsVisible, row, "parent is closed"));
                }
                while stack.last().is_some_and(|(open, _)| *open != parent) {
                    stack.pop();
                }
                let Some(&(_, parent_level)) = stack.last() else {
                    return Err(violation(
                        Invariant::Contiguous,
                        row,
                        format!("row is outside the block of its parent at row {parent_row}"),
                    ));
                };
                if record.level() != parent_level + 1 {
                    return Err(violation(
                        Invariant::Level,
                        row,
                        format!("level {} under parent level {parent_level}", record.level()),
                    ));
                }
            }
        }
        if record.parent() != parent {
            return Err(violation(
                Invariant::AncestorsVisible,
                row,
                format!("parent link {:?}, expected {parent:?}", record.parent()),
            ));
        }

        let source_index = order.get(&id).copied().unwrap_or(usize::MAX);
        if let Some(previous) = last_sibling.insert(parent, source_index) {
            if previous > source_index {
                return Err(violation(
                    Invariant::SiblingOrder,
                    row,
                    format!("source index {source_index} after sibling at {previous}"),
                ));
            }
        }
        stack.push((id, record.level()));
    }

    check_counts(source, view)
}

/// Recounts descendants by scanning forward while rows are deeper.
fn check_counts(source: &SourceCollection, view: &FlatView) -> Result<(), InvariantViolation> {
    let levels: Vec<u32> = view
        .rows()
        .iter()
        .map(|id| source.get(*id).map_or(0, |record| record.level()))
        .collect();
    for (row, &id) in view.rows().iter().enumerate() {
        let Some(record) = source.get(id) else {
            continue;
        };
        let level = levels[row];
        let actual = levels[row + 1..].iter().take_while(|l| **l > level).count();
        if record.descendants() != actual {
            return Err(violation(
                Invariant::DescendantCount,
                row,
                format!("count {} but {actual} rows nested", record.descendants()),
            ));
        }
        if actual > 0 && !record.opened() {
            return Err(violation(Invariant::AncestorsVisible, row, "closed record has visible descendants"));
        }
    }
    Ok(())
}
