//! Worker thread owning one [`DataTree`] per session.
//!
//! Every command is one turn: the edit is applied, the deferred
//! expand/collapse work is drained, and whatever the turn did to the view is
//! sent as a single [`TreeEvent::ViewMutations`] batch.

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use bus::{RowFields, TreeCommand, TreeEvent};
use core_types::{Revision, SessionId};
use thiserror::Error;
use tree::{DataTree, Mutation, Record, Root, SourceCollection, TreeError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("no session {0}")]
    UnknownSession(SessionId),
    #[error("session {0} is already open")]
    DuplicateSession(SessionId),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

struct Session {
    tree: DataTree,
    revision: Revision,
}

pub fn start_tree_runtime(cmd_rx: Receiver<TreeCommand>, evt_tx: Sender<TreeEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut sessions: HashMap<SessionId, Session> = HashMap::new();

        while let Ok(cmd) = cmd_rx.recv() {
            let session_id = cmd.session_id();
            if let Err(err) = handle_command(&mut sessions, cmd, &evt_tx) {
                log::warn!(target: "tree.runtime", "session {session_id}: {err}");
                let _ = evt_tx.send(TreeEvent::Error {
                    session_id,
                    error: err.to_string(),
                });
            }
        }
        log::debug!(target: "tree.runtime", "command channel closed, {} sessions dropped", sessions.len());
    })
}

fn handle_command(
    sessions: &mut HashMap<SessionId, Session>,
    cmd: TreeCommand,
    evt_tx: &Sender<TreeEvent>,
) -> Result<(), RuntimeError> {
    let session_id = cmd.session_id();
    let mut emitted: Vec<Mutation> = Vec::new();

    match cmd {
        TreeCommand::Open {
            config,
            partial_data,
            rows,
            ..
        } => {
            if sessions.contains_key(&session_id) {
                return Err(RuntimeError::DuplicateSession(session_id));
            }
            let mut source = SourceCollection::new();
            source.meta_mut().partial_data = partial_data;
            let records = to_records(&mut source, &rows);
            source.replace(records);
            let mut tree = DataTree::new(config, source);
            tree.rebuild(&mut emitted);
            sessions.insert(
                session_id,
                Session {
                    tree,
                    revision: Revision::INITIAL,
                },
            );
            log::debug!(target: "tree.runtime", "session {session_id} opened with {} rows", rows.len());
        }
        TreeCommand::Close { .. } => {
            sessions
                .remove(&session_id)
                .ok_or(RuntimeError::UnknownSession(session_id))?;
            log::debug!(target: "tree.runtime", "session {session_id} closed");
            return Ok(());
        }
        TreeCommand::Snapshot { .. } => {
            let session = session_mut(sessions, session_id)?;
            let _ = evt_tx.send(TreeEvent::ViewRows {
                session_id,
                revision: session.revision,
                rows: session.tree.rows(),
            });
            return Ok(());
        }
        TreeCommand::Configure { config, .. } => {
            session_mut(sessions, session_id)?
                .tree
                .configure(config, &mut emitted);
        }
        TreeCommand::Load { rows, .. } => {
            let tree = &mut session_mut(sessions, session_id)?.tree;
            let records = to_records(tree.source_mut(), &rows);
            tree.replace(records, &mut emitted);
        }
        TreeCommand::Splice {
            index,
            delete_count,
            rows,
            ..
        } => {
            let tree = &mut session_mut(sessions, session_id)?.tree;
            let records = to_records(tree.source_mut(), &rows);
            tree.splice(index, delete_count, records, &mut emitted)?;
        }
        TreeCommand::SetField {
            row, field, value, ..
        } => {
            let tree = &mut session_mut(sessions, session_id)?.tree;
            let field = tree.field(&field);
            tree.set_field(row, field, value, &mut emitted)?;
        }
        TreeCommand::SetViewField {
            row, field, value, ..
        } => {
            let tree = &mut session_mut(sessions, session_id)?.tree;
            let field = tree.field(&field);
            tree.set_view_field(row, field, value, &mut emitted)?;
        }
    }

    let session = session_mut(sessions, session_id)?;
    let ran = session.tree.run_deferred(&mut emitted);
    if ran > 0 {
        log::trace!(target: "tree.runtime", "session {session_id}: {ran} deferred tasks");
    }

    let (view, source): (Vec<Mutation>, Vec<Mutation>) =
        emitted.into_iter().partition(|m| m.root() == Root::View);
    if !source.is_empty() {
        let _ = evt_tx.send(TreeEvent::SourceMutations {
            session_id,
            mutations: source,
        });
    }
    if !view.is_empty() {
        session.revision = session.revision.next();
        let _ = evt_tx.send(TreeEvent::ViewMutations {
            session_id,
            revision: session.revision,
            mutations: view,
        });
    }
    Ok(())
}

fn session_mut(
    sessions: &mut HashMap<SessionId, Session>,
    session_id: SessionId,
) -> Result<&mut Session, RuntimeError> {
    sessions
        .get_mut(&session_id)
        .ok_or(RuntimeError::UnknownSession(session_id))
}

fn to_records(source: &mut SourceCollection, rows: &[RowFields]) -> Vec<Record> {
    rows.iter()
        .map(|row| source.make_record(row.iter().map(|(name, value)| (&**name, value.clone()))))
        .collect()
}
