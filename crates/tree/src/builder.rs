use crate::config::TreeFields;
use crate::mutation::NullSink;
use crate::patcher::{ChildHint, Patcher};
use crate::record::{RecordId, TreeState};
use crate::source::SourceCollection;
use crate::view::FlatView;

/// Computes the view from scratch.
///
/// Every record's tree state is reset, then the whole source goes through the
/// same insertion pass the patcher uses for an insert batch. No mutations are
/// emitted; callers announce the result as a replace.
pub fn build(source: &mut SourceCollection, fields: &TreeFields) -> FlatView {
    let ids: Vec<RecordId> = source.ids().to_vec();
    for &id in &ids {
        if let Some(tree) = source.tree_mut(id) {
            *tree = TreeState::default();
        }
    }

    let mut view = FlatView::with_page(source.meta().page);
    let mut sink = NullSink;
    let hint = ChildHint::compute(source, fields);
    Patcher::new(*fields, source, &mut view, &mut sink).insert_records(&hint, &ids);

    log::debug!(
        target: "tree.build",
        "built view: {} of {} records visible",
        view.len(),
        source.len()
    );
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::schema::Schema;
    use crate::source::PageInfo;
    use crate::value::Value;

    fn source_with(rows: &[(i64, Option<i64>, bool)]) -> (SourceCollection, TreeFields) {
        let mut source = SourceCollection::new();
        let fields = TreeConfig::new("id", "pid")
            .resolve(source.schema_mut())
            .unwrap();
        let records = rows
            .iter()
            .map(|&(key, parent, opened)| {
                source.make_record([
                    ("id", Value::from(key)),
                    ("pid", Value::from(parent)),
                    (Schema::OPENED_NAME, Value::Bool(opened)),
                ])
            })
            .collect();
        source.splice(0, 0, records).unwrap();
        (source, fields)
    }

    fn keys(source: &SourceCollection, fields: &TreeFields, view: &FlatView) -> Vec<i64> {
        view.rows()
            .iter()
            .map(|id| fields.key(source.get(*id).unwrap()).as_int().unwrap())
            .collect()
    }

    #[test]
    fn builds_depth_first_in_source_order() {
        let (mut source, fields) = source_with(&[
            (3, Some(1), false),
            (1, None, true),
            (2, None, true),
            (4, Some(2), true),
            (5, Some(1), false),
            (6, Some(4), false),
        ]);
        let view = build(&mut source, &fields);
        assert_eq!(keys(&source, &fields, &view), vec![1, 3, 5, 2, 4, 6]);
        let levels: Vec<u32> = view.rows().iter().map(|id| source.get(*id).unwrap().level()).collect();
        assert_eq!(levels, vec![0, 1, 1, 0, 1, 2]);
        let two = source.get(view.rows()[3]).unwrap();
        assert_eq!(two.descendants(), 2);
    }

    #[test]
    fn closed_parents_hide_their_subtree() {
        let (mut source, fields) =
            source_with(&[(1, None, false), (2, Some(1), true), (3, Some(2), false)]);
        let view = build(&mut source, &fields);
        assert_eq!(keys(&source, &fields, &view), vec![1]);
        let root = source.get(view.rows()[0]).unwrap();
        assert!(root.has_children());
        assert_eq!(root.children_count(), None);
    }

    #[test]
    fn has_children_by_membership() {
        let (mut source, fields) = source_with(&[(1, None, true), (2, Some(1), false)]);
        let view = build(&mut source, &fields);
        let flags: Vec<bool> = view
            .rows()
            .iter()
            .map(|id| source.get(*id).unwrap().has_children())
            .collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn partial_mode_trusts_the_field_and_defaults_to_true() {
        let mut source = SourceCollection::new();
        source.meta_mut().partial_data = true;
        let fields = TreeConfig::new("id", "pid")
            .with_has_child_field("hc")
            .resolve(source.schema_mut())
            .unwrap();
        let records = vec![
            source.make_record([("id", Value::Int(1))]),
            source.make_record([("id", Value::Int(2)), ("hc", Value::Bool(false))]),
        ];
        source.splice(0, 0, records).unwrap();
        let view = build(&mut source, &fields);
        let flags: Vec<bool> = view
            .rows()
            .iter()
            .map(|id| source.get(*id).unwrap().has_children())
            .collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn view_copies_paging_metadata() {
        let (mut source, fields) = source_with(&[(1, None, false)]);
        let page = PageInfo {
            offset: 0,
            limit: 50,
            total: Some(120),
        };
        source.meta_mut().page = Some(page);
        let view = build(&mut source, &fields);
        assert_eq!(view.page(), Some(page));
    }

    #[test]
    fn rebuild_resets_previous_state() {
        let (mut source, fields) = source_with(&[(1, None, true), (2, Some(1), false)]);
        build(&mut source, &fields);
        source.set_opened(0, false).unwrap();
        let view = build(&mut source, &fields);
        assert_eq!(view.len(), 1);
        let child = source.id_at(1).unwrap();
        assert_eq!(source.get(child).unwrap().parent(), None);
    }
}
