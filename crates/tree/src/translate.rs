//! Readdressing of mutations between the source and view coordinate spaces.
//!
//! Rows are matched by record identity, never by index. A mutation whose
//! record is missing on the other side is dropped (`None`). Collection-level
//! splices and replaces are not translated here: the patcher produces view
//! splices itself, so only [`bypass`] forwards them.

use crate::mutation::{Mutation, Root};
use crate::source::SourceCollection;
use crate::view::FlatView;

/// Source-addressed row mutation → view-addressed row mutation.
pub fn source_to_view(
    mutation: &Mutation,
    source: &SourceCollection,
    view: &FlatView,
) -> Option<Mutation> {
    let Some(row) = mutation.path.row() else {
        return (!mutation.path.is_root()).then(|| bypass(mutation, Root::View));
    };
    let id = source.id_at(row)?;
    let position = view.position(id)?;
    Some(mutation.with_path(mutation.path.readdressed(Root::View, position)))
}

/// View-addressed row mutation → source-addressed row mutation.
pub fn view_to_source(
    mutation: &Mutation,
    source: &SourceCollection,
    view: &FlatView,
) -> Option<Mutation> {
    let Some(row) = mutation.path.row() else {
        return (!mutation.path.is_root()).then(|| bypass(mutation, Root::Source));
    };
    let id = view.get(row)?;
    let index = source.index_of(id)?;
    Some(mutation.with_path(mutation.path.readdressed(Root::Source, index)))
}

/// Rewrites only the root; used when the view mirrors the source.
pub fn bypass(mutation: &Mutation, root: Root) -> Mutation {
    mutation.with_path(mutation.path.with_root(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::MutationPath;
    use crate::record::RecordId;
    use crate::value::Value;

    fn fixture() -> (SourceCollection, FlatView) {
        let mut source = SourceCollection::new();
        let records = (0..4).map(|key| source.make_record([("id", key)])).collect();
        source.splice(0, 0, records).unwrap();
        let mut view = FlatView::new();
        view.reset(vec![RecordId(3), RecordId(1)]);
        (source, view)
    }

    fn name_update(source: &mut SourceCollection, root: Root, row: usize) -> Mutation {
        let name = source.field("name");
        Mutation::update(MutationPath::field(root, row, name), Value::from("x"), Value::Null)
    }

    #[test]
    fn source_rows_map_to_view_positions() {
        let (mut source, view) = fixture();
        let m = name_update(&mut source, Root::Source, 3);
        let translated = source_to_view(&m, &source, &view).unwrap();
        assert_eq!(translated.root(), Root::View);
        assert_eq!(translated.path.row(), Some(0));
        assert_eq!(translated.path.row_field(), m.path.row_field());
    }

    #[test]
    fn hidden_rows_are_dropped() {
        let (mut source, view) = fixture();
        let m = name_update(&mut source, Root::Source, 2);
        assert!(source_to_view(&m, &source, &view).is_none());
    }

    #[test]
    fn view_rows_map_back_to_source() {
        let (mut source, view) = fixture();
        let m = name_update(&mut source, Root::View, 1);
        let translated = view_to_source(&m, &source, &view).unwrap();
        assert_eq!(translated.root(), Root::Source);
        assert_eq!(translated.path.row(), Some(1));
    }

    #[test]
    fn splices_are_not_translated() {
        let (source, view) = fixture();
        let m = Mutation::splice(Root::Source, 0, vec![RecordId(0)], Vec::new());
        assert!(source_to_view(&m, &source, &view).is_none());
        assert_eq!(bypass(&m, Root::View).root(), Root::View);
    }

    #[test]
    fn meta_updates_are_rerooted() {
        let (source, view) = fixture();
        let m = Mutation::update(MutationPath::meta(Root::Source, "page"), Value::Int(2), Value::Null);
        let translated = source_to_view(&m, &source, &view).unwrap();
        assert_eq!(translated.path.meta_name(), Some("page"));
        assert_eq!(translated.root(), Root::View);
    }
}
