use crate::record::RecordId;
use std::collections::VecDeque;

/// Expand/collapse work posted by a mutation turn and run on the next one.
///
/// Tasks carry record identity only; the view position is resolved when the
/// task runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredTask {
    ShowChildren(RecordId),
    HideChildren(RecordId),
}

impl DeferredTask {
    pub fn record(self) -> RecordId {
        match self {
            DeferredTask::ShowChildren(id) | DeferredTask::HideChildren(id) => id,
        }
    }
}

/// FIFO of [`DeferredTask`]s.
#[derive(Clone, Debug, Default)]
pub struct DeferredQueue {
    tasks: VecDeque<DeferredTask>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: DeferredTask) {
        self.tasks.push_back(task);
    }

    pub fn pop(&mut self) -> Option<DeferredTask> {
        self.tasks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeferredTask> {
        self.tasks.iter()
    }
}
