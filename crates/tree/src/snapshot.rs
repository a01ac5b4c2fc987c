use crate::record::RecordId;
use crate::schema::FieldId;
use crate::source::SourceCollection;
use crate::value::Value;
use crate::view::FlatView;
use std::fmt;

/// Read-only projection of one view row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewRow {
    pub id: RecordId,
    pub key: Value,
    pub level: u32,
    pub descendants: usize,
    pub has_children: bool,
    pub opened: bool,
}

/// Projects every view row. `key` is `None` when no key field is configured
/// (bypass), in which case rows carry `Value::Null`.
pub fn view_rows(source: &SourceCollection, view: &FlatView, key: Option<FieldId>) -> Vec<ViewRow> {
    view.rows()
        .iter()
        .filter_map(|&id| {
            let record = source.get(id)?;
            Some(ViewRow {
                id,
                key: key.map(|field| record.get(field).clone()).unwrap_or_default(),
                level: record.level(),
                descendants: record.descendants(),
                has_children: record.has_children(),
                opened: record.opened(),
            })
        })
        .collect()
}

/// Deterministic text form of a view for tests and the scenario runner.
/// One line per row: the key indented by two spaces per level.
#[derive(Clone, Copy, Debug, Default)]
pub struct ViewSnapshotOptions {
    /// Appends `[level=.. desc=.. children=yes|no]` to every line.
    pub counts: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSnapshot {
    lines: Vec<String>,
}

impl ViewSnapshot {
    pub fn new(rows: &[ViewRow], options: ViewSnapshotOptions) -> Self {
        let lines = rows
            .iter()
            .map(|row| {
                let indent = "  ".repeat(row.level as usize);
                if options.counts {
                    format!(
                        "{indent}{} [level={} desc={} children={}]",
                        row.key,
                        row.level,
                        row.descendants,
                        if row.has_children { "yes" } else { "no" }
                    )
                } else {
                    format!("{indent}{}", row.key)
                }
            })
            .collect();
        Self { lines }
    }

    pub fn capture(
        source: &SourceCollection,
        view: &FlatView,
        key: Option<FieldId>,
        options: ViewSnapshotOptions,
    ) -> Self {
        Self::new(&view_rows(source, view, key), options)
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for ViewSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}
