//! Bounded undo/redo log of reversible graph actions.

use nodeweave_core::{Edge, EdgeId, Node, NodeId, Vec2};
use nodeweave_events::{Event, EventBus};
use thiserror::Error;

pub const DEFAULT_HISTORY_DEPTH: usize = 20;

/// A recorded mutation carrying enough state to apply it in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoAction {
    CreateNode {
        node: Node,
    },
    /// `edges` are the connections removed together with the node.
    DeleteNode {
        node: Node,
        edges: Vec<Edge>,
    },
    MoveNode {
        id: NodeId,
        from: Vec2,
        to: Vec2,
    },
    UpdateNodeText {
        id: NodeId,
        from: String,
        to: String,
    },
    CreateEdge {
        edge: Edge,
    },
    DeleteEdge {
        edge: Edge,
    },
    UpdateEdgeLabel {
        id: EdgeId,
        from: Option<String>,
        to: Option<String>,
    },
    /// Reverted last-to-first, replayed first-to-last.
    Batch {
        description: String,
        actions: Vec<UndoAction>,
    },
}

impl UndoAction {
    pub fn kind(&self) -> &'static str {
        match self {
            UndoAction::CreateNode { .. } => "CREATE_NODE",
            UndoAction::DeleteNode { .. } => "DELETE_NODE",
            UndoAction::MoveNode { .. } => "MOVE_NODE",
            UndoAction::UpdateNodeText { .. } => "UPDATE_NODE_TEXT",
            UndoAction::CreateEdge { .. } => "CREATE_EDGE",
            UndoAction::DeleteEdge { .. } => "DELETE_EDGE",
            UndoAction::UpdateEdgeLabel { .. } => "UPDATE_EDGE_LABEL",
            UndoAction::Batch { .. } => "BATCH",
        }
    }

    pub fn description(&self) -> String {
        match self {
            UndoAction::CreateNode { .. } => "Create node".to_string(),
            UndoAction::DeleteNode { edges, .. } if !edges.is_empty() => {
                format!("Delete node and {} edge(s)", edges.len())
            }
            UndoAction::DeleteNode { .. } => "Delete node".to_string(),
            UndoAction::MoveNode { .. } => "Move node".to_string(),
            UndoAction::UpdateNodeText { .. } => "Edit node text".to_string(),
            UndoAction::CreateEdge { .. } => "Create edge".to_string(),
            UndoAction::DeleteEdge { .. } => "Delete edge".to_string(),
            UndoAction::UpdateEdgeLabel { .. } => "Edit edge label".to_string(),
            UndoAction::Batch { description, .. } => description.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Revert,
    Replay,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistoryError {
    #[error("node {0} no longer exists")]
    MissingNode(NodeId),
    #[error("edge {0} no longer exists")]
    MissingEdge(EdgeId),
    #[error("conflicting state: {0}")]
    Conflict(String),
}

/// Something recorded actions can be applied to.
pub trait ReplayTarget {
    /// Apply a single non-batch action. Batches are unrolled by the log.
    fn apply_step(&mut self, action: &UndoAction, direction: Direction) -> Result<(), HistoryError>;
}

/// Undo/redo stacks with a fixed depth. The oldest entries are evicted first.
pub struct CommandLog {
    undo_stack: Vec<UndoAction>,
    redo_stack: Vec<UndoAction>,
    max_depth: usize,
    replaying: bool,
    open_batches: Vec<(String, Vec<UndoAction>)>,
    event_bus: EventBus,
}

impl CommandLog {
    pub fn new(max_depth: usize, event_bus: EventBus) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
            replaying: false,
            open_batches: Vec::new(),
            event_bus,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    /// Record an action. New user actions invalidate the redo stack.
    pub fn push(&mut self, action: UndoAction) {
        if self.replaying {
            tracing::trace!(kind = action.kind(), "ignoring push during replay");
            return;
        }
        if let Some((_, actions)) = self.open_batches.last_mut() {
            actions.push(action);
            return;
        }
        self.commit(action);
    }

    fn commit(&mut self, action: UndoAction) {
        self.redo_stack.clear();
        self.undo_stack.push(action);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        self.notify_change();
    }

    /// Start grouping pushes into one entry. Nested batches flatten into the
    /// outermost one.
    pub fn begin_batch(&mut self, description: impl Into<String>) {
        self.open_batches.push((description.into(), Vec::new()));
    }

    pub fn end_batch(&mut self) {
        let Some((description, actions)) = self.open_batches.pop() else {
            tracing::warn!("end_batch without matching begin_batch");
            return;
        };
        if let Some((_, outer)) = self.open_batches.last_mut() {
            outer.extend(actions);
            return;
        }
        if !actions.is_empty() {
            self.commit(UndoAction::Batch {
                description,
                actions,
            });
        }
    }

    pub fn in_batch(&self) -> bool {
        !self.open_batches.is_empty()
    }

    /// Drop the most recent entry if it created `id`. Used when a freshly
    /// created node is abandoned empty.
    pub fn discard_created(&mut self, id: &NodeId) -> bool {
        let created = |action: &UndoAction| {
            matches!(action, UndoAction::CreateNode { node } if &node.id == id)
        };
        if let Some((_, actions)) = self.open_batches.last_mut() {
            if actions.last().is_some_and(created) {
                actions.pop();
                return true;
            }
            return false;
        }
        if self.undo_stack.last().is_some_and(created) {
            self.undo_stack.pop();
            self.notify_change();
            return true;
        }
        false
    }

    /// Revert the newest entry. Returns its description, or `None` when the
    /// stack is empty. On failure the target is restored and the entry dropped.
    pub fn undo<T>(&mut self, target: &mut T) -> Result<Option<String>, HistoryError>
    where
        T: ReplayTarget + Clone,
    {
        if self.in_batch() {
            return Err(HistoryError::Conflict(
                "undo while a transaction is open".to_string(),
            ));
        }
        let Some(action) = self.undo_stack.pop() else {
            return Ok(None);
        };
        let description = action.description();
        match self.run(target, &action, Direction::Revert) {
            Ok(()) => {
                self.redo_stack.push(action);
                self.notify_change();
                Ok(Some(description))
            }
            Err(err) => {
                self.report_failure(&description, &err);
                Err(err)
            }
        }
    }

    pub fn redo<T>(&mut self, target: &mut T) -> Result<Option<String>, HistoryError>
    where
        T: ReplayTarget + Clone,
    {
        if self.in_batch() {
            return Err(HistoryError::Conflict(
                "redo while a transaction is open".to_string(),
            ));
        }
        let Some(action) = self.redo_stack.pop() else {
            return Ok(None);
        };
        let description = action.description();
        match self.run(target, &action, Direction::Replay) {
            Ok(()) => {
                self.undo_stack.push(action);
                self.notify_change();
                Ok(Some(description))
            }
            Err(err) => {
                self.report_failure(&description, &err);
                Err(err)
            }
        }
    }

    fn run<T>(&mut self, target: &mut T, action: &UndoAction, direction: Direction) -> Result<(), HistoryError>
    where
        T: ReplayTarget + Clone,
    {
        let checkpoint = target.clone();
        self.replaying = true;
        let result = apply(target, action, direction);
        self.replaying = false;
        if result.is_err() {
            *target = checkpoint;
        }
        result
    }

    fn report_failure(&self, description: &str, err: &HistoryError) {
        tracing::warn!(%description, error = %err, "history replay failed, entry discarded");
        self.event_bus.publish(Event::ReplayFailed {
            description: description.to_string(),
            reason: err.to_string(),
        });
        self.notify_change();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(UndoAction::description)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(UndoAction::description)
    }

    /// Oldest first.
    pub fn undo_entries(&self) -> &[UndoAction] {
        &self.undo_stack
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.open_batches.clear();
        self.notify_change();
    }

    fn notify_change(&self) {
        self.event_bus.publish(Event::UndoStackChanged {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            undo_description: self.undo_description(),
            redo_description: self.redo_description(),
        });
    }
}

fn apply<T: ReplayTarget>(target: &mut T, action: &UndoAction, direction: Direction) -> Result<(), HistoryError> {
    match action {
        UndoAction::Batch { actions, .. } => match direction {
            Direction::Revert => actions
                .iter()
                .rev()
                .try_for_each(|step| apply(target, step, direction)),
            Direction::Replay => actions
                .iter()
                .try_for_each(|step| apply(target, step, direction)),
        },
        step => target.apply_step(step, direction),
    }
}
