use core_types::{Revision, SessionId};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use tree::{Mutation, TreeConfig, Value, ViewRow};

/// One record as named fields; names are interned by the session's schema.
pub type RowFields = Vec<(Arc<str>, Value)>;

#[derive(Debug)]
pub enum TreeCommand {
    // Session lifecycle
    Open {
        session_id: SessionId,
        config: TreeConfig,
        partial_data: bool,
        rows: Vec<RowFields>,
    },
    Close {
        session_id: SessionId,
    },
    // Source edits
    Configure {
        session_id: SessionId,
        config: TreeConfig,
    },
    Load {
        session_id: SessionId,
        rows: Vec<RowFields>,
    },
    Splice {
        session_id: SessionId,
        index: usize,
        delete_count: usize,
        rows: Vec<RowFields>,
    },
    SetField {
        session_id: SessionId,
        row: usize,
        field: Arc<str>,
        value: Value,
    },
    // View edits
    SetViewField {
        session_id: SessionId,
        row: usize,
        field: Arc<str>,
        value: Value,
    },
    Snapshot {
        session_id: SessionId,
    },
}

impl TreeCommand {
    pub fn session_id(&self) -> SessionId {
        match self {
            TreeCommand::Open { session_id, .. }
            | TreeCommand::Close { session_id }
            | TreeCommand::Configure { session_id, .. }
            | TreeCommand::Load { session_id, .. }
            | TreeCommand::Splice { session_id, .. }
            | TreeCommand::SetField { session_id, .. }
            | TreeCommand::SetViewField { session_id, .. }
            | TreeCommand::Snapshot { session_id } => *session_id,
        }
    }
}

#[derive(Debug)]
pub enum TreeEvent {
    /// Everything one turn did to the view, in application order.
    ViewMutations {
        session_id: SessionId,
        revision: Revision,
        mutations: Vec<Mutation>,
    },
    /// Source edits the engine made on its own (placeholders, reverse edits).
    SourceMutations {
        session_id: SessionId,
        mutations: Vec<Mutation>,
    },
    ViewRows {
        session_id: SessionId,
        revision: Revision,
        rows: Vec<ViewRow>,
    },
    Error {
        session_id: SessionId,
        error: String,
    },
}

pub struct Bus {
    pub cmd_tx: Sender<TreeCommand>,
    pub evt_rx: Receiver<TreeEvent>,
    pub evt_tx: Sender<TreeEvent>, // shareable for runtimes
}

impl Bus {
    /// Creates the channel pair; the command receiver goes to the runtime.
    pub fn connect() -> (Self, Receiver<TreeCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (evt_tx, evt_rx) = mpsc::channel();
        (
            Self {
                cmd_tx,
                evt_rx,
                evt_tx,
            },
            cmd_rx,
        )
    }
}
