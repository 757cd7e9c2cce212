//! Raw node/edge storage. Every mutation publishes its event; none records history.

use indexmap::IndexMap;
use nodeweave_core::{Edge, EdgeId, Node, NodeId, NodeState, Vec2, now_millis};
use nodeweave_events::{Event, EventBus};

use crate::history::{Direction, HistoryError, ReplayTarget, UndoAction};
use crate::sizing::NodeSizer;

/// Why an edge could not be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeRejection {
    SelfLoop,
    MissingEndpoint(NodeId),
    Duplicate,
    IdTaken,
}

#[derive(Debug, Clone)]
pub struct GraphStore {
    nodes: IndexMap<NodeId, Node>,
    edges: IndexMap<EdgeId, Edge>,
    sizer: NodeSizer,
    events: EventBus,
}

impl GraphStore {
    pub fn new(sizer: NodeSizer, events: EventBus) -> Self {
        Self {
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            sizer,
            events,
        }
    }

    pub fn sizer(&self) -> &NodeSizer {
        &self.sizer
    }

    /// Swap the measurer and resize every node with it.
    pub fn set_sizer(&mut self, sizer: NodeSizer) {
        self.sizer = sizer;
        let ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        for id in ids {
            self.resize(&id);
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn find_edge(&self, source: &NodeId, target: &NodeId) -> Option<&Edge> {
        self.edges
            .values()
            .find(|edge| &edge.source_id == source && &edge.target_id == target)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    /// Returns `false` when the id is already taken.
    pub fn insert_node(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        self.events.publish(Event::NodeCreated { id });
        true
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<(Node, Vec<Edge>)> {
        if !self.nodes.contains_key(id) {
            return None;
        }
        let connected: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|edge| edge.touches(id))
            .map(|edge| edge.id.clone())
            .collect();
        let removed: Vec<Edge> = connected
            .iter()
            .filter_map(|edge_id| self.remove_edge(edge_id))
            .collect();

        let node = self.nodes.shift_remove(id)?;
        self.events.publish(Event::NodeDeleted {
            id: id.clone(),
            removed_edges: removed.len(),
        });
        Some((node, removed))
    }

    /// Returns the previous position.
    pub fn set_position(&mut self, id: &NodeId, pos: Vec2) -> Option<Vec2> {
        let node = self.nodes.get_mut(id)?;
        let previous = node.center();
        node.x = pos.x;
        node.y = pos.y;
        self.events.publish(Event::NodeMoved {
            id: id.clone(),
            x: pos.x,
            y: pos.y,
        });
        Some(previous)
    }

    /// Position write without an event, for per-tick layout output.
    pub fn set_position_quiet(&mut self, id: &NodeId, pos: Vec2) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.x = pos.x;
                node.y = pos.y;
                true
            }
            None => false,
        }
    }

    /// Replace the text and recompute the size. Returns the previous text.
    pub fn set_text(&mut self, id: &NodeId, text: &str) -> Option<String> {
        let node = self.nodes.get_mut(id)?;
        let previous = std::mem::replace(&mut node.text, text.to_string());
        node.updated_at = now_millis();
        self.events.publish(Event::NodeTextChanged { id: id.clone() });
        self.resize(id);
        Some(previous)
    }

    /// Returns the previous state. Callers validate the transition.
    pub fn set_state(&mut self, id: &NodeId, state: NodeState) -> Option<NodeState> {
        let node = self.nodes.get_mut(id)?;
        let previous = node.state;
        if previous == state {
            return Some(previous);
        }
        node.state = state;
        let resize = self.sizer.needs_resize(&node.text, previous, state);
        self.events.publish(Event::NodeStateChanged {
            id: id.clone(),
            state,
        });
        if resize {
            self.resize(id);
        }
        Some(previous)
    }

    fn resize(&mut self, id: &NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let size = self.sizer.size_for(&node.text, node.state);
        if size == node.size() {
            return;
        }
        node.w = size.x;
        node.h = size.y;
        self.events.publish(Event::NodeResized {
            id: id.clone(),
            w: size.x,
            h: size.y,
        });
    }

    pub fn insert_edge(&mut self, edge: Edge) -> Result<(), EdgeRejection> {
        if edge.source_id == edge.target_id {
            return Err(EdgeRejection::SelfLoop);
        }
        for endpoint in [&edge.source_id, &edge.target_id] {
            if !self.nodes.contains_key(endpoint) {
                return Err(EdgeRejection::MissingEndpoint(endpoint.clone()));
            }
        }
        if self.edges.contains_key(&edge.id) {
            return Err(EdgeRejection::IdTaken);
        }
        if self.find_edge(&edge.source_id, &edge.target_id).is_some() {
            return Err(EdgeRejection::Duplicate);
        }
        let id = edge.id.clone();
        self.edges.insert(id.clone(), edge);
        self.events.publish(Event::EdgeCreated { id });
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &EdgeId) -> Option<Edge> {
        let edge = self.edges.shift_remove(id)?;
        self.events.publish(Event::EdgeDeleted { id: id.clone() });
        Some(edge)
    }

    /// Returns the previous label.
    pub fn set_label(&mut self, id: &EdgeId, label: Option<String>) -> Option<Option<String>> {
        let edge = self.edges.get_mut(id)?;
        let previous = std::mem::replace(&mut edge.label, label);
        self.events.publish(Event::EdgeLabelChanged { id: id.clone() });
        Some(previous)
    }

    /// Re-insert a node snapshot. Restored nodes come back unfocused.
    fn restore_node(&mut self, node: &Node) -> Result<(), HistoryError> {
        let mut node = node.clone();
        node.state = NodeState::Inactive;
        let size = self.sizer.size_for(&node.text, node.state);
        node.w = size.x;
        node.h = size.y;
        let id = node.id.clone();
        if self.insert_node(node) {
            Ok(())
        } else {
            Err(HistoryError::Conflict(format!("node {id} already exists")))
        }
    }

    fn restore_edge(&mut self, edge: &Edge) -> Result<(), HistoryError> {
        self.insert_edge(edge.clone()).map_err(|rejection| match rejection {
            EdgeRejection::MissingEndpoint(node) => HistoryError::MissingNode(node),
            other => HistoryError::Conflict(format!("edge {} rejected: {other:?}", edge.id)),
        })
    }

    fn take_node(&mut self, id: &NodeId) -> Result<(), HistoryError> {
        self.remove_node(id)
            .map(|_| ())
            .ok_or_else(|| HistoryError::MissingNode(id.clone()))
    }

    fn take_edge(&mut self, id: &EdgeId) -> Result<(), HistoryError> {
        self.remove_edge(id)
            .map(|_| ())
            .ok_or_else(|| HistoryError::MissingEdge(id.clone()))
    }
}

impl ReplayTarget for GraphStore {
    fn apply_step(&mut self, action: &UndoAction, direction: Direction) -> Result<(), HistoryError> {
        use Direction::{Replay, Revert};
        match (action, direction) {
            (UndoAction::CreateNode { node }, Revert) => self.take_node(&node.id),
            (UndoAction::CreateNode { node }, Replay) => self.restore_node(node),
            (UndoAction::DeleteNode { node, edges }, Revert) => {
                self.restore_node(node)?;
                edges.iter().try_for_each(|edge| self.restore_edge(edge))
            }
            (UndoAction::DeleteNode { node, .. }, Replay) => self.take_node(&node.id),
            (UndoAction::MoveNode { id, from, to }, direction) => {
                let pos = if direction == Revert { *from } else { *to };
                self.set_position(id, pos)
                    .map(|_| ())
                    .ok_or_else(|| HistoryError::MissingNode(id.clone()))
            }
            (UndoAction::UpdateNodeText { id, from, to }, direction) => {
                let text = if direction == Revert { from } else { to };
                self.set_text(id, text)
                    .map(|_| ())
                    .ok_or_else(|| HistoryError::MissingNode(id.clone()))
            }
            (UndoAction::CreateEdge { edge }, Revert) => self.take_edge(&edge.id),
            (UndoAction::CreateEdge { edge }, Replay) => self.restore_edge(edge),
            (UndoAction::DeleteEdge { edge }, Revert) => self.restore_edge(edge),
            (UndoAction::DeleteEdge { edge }, Replay) => self.take_edge(&edge.id),
            (UndoAction::UpdateEdgeLabel { id, from, to }, direction) => {
                let label = if direction == Revert { from } else { to };
                self.set_label(id, label.clone())
                    .map(|_| ())
                    .ok_or_else(|| HistoryError::MissingEdge(id.clone()))
            }
            (UndoAction::Batch { description, .. }, _) => Err(HistoryError::Conflict(format!(
                "nested batch '{description}' reached the store"
            ))),
        }
    }
}
