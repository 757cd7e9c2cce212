//! The authoritative diagram: nodes, edges, selection state and undo history.

use nodeweave_core::{
    Edge, EdgeId, EdgeStyle, Node, NodeId, NodeState, Rect, Timestamp, Vec2, now_millis,
};
use nodeweave_events::{Event, EventBus};

use crate::document::{DocumentData, DocumentError, EdgeRecord, LoadReport, NodeRecord};
use crate::geometry::{bounding_box, rects_intersect};
use crate::history::{CommandLog, HistoryError, UndoAction};
use crate::settings::EditorSettings;
use crate::sizing::NodeSizer;
use crate::store::GraphStore;

/// Whether a mutation is pushed onto the undo log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recording {
    Record,
    Silent,
}

/// Partial node description accepted by [`GraphModel::create_node`].
#[derive(Debug, Clone, Default)]
pub struct NewNode {
    pub id: Option<NodeId>,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub state: NodeState,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

impl NewNode {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewEdge {
    pub id: Option<EdgeId>,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub label: Option<String>,
    pub style: EdgeStyle,
}

impl NewEdge {
    pub fn new(source_id: impl Into<NodeId>, target_id: impl Into<NodeId>) -> Self {
        Self {
            id: None,
            source_id: source_id.into(),
            target_id: target_id.into(),
            label: None,
            style: EdgeStyle::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<EdgeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

fn normalize_label(label: Option<String>) -> Option<String> {
    label.filter(|label| !label.trim().is_empty())
}

const GOLDEN_ANGLE: f32 = 2.399_963;
const SEED_SPACING: f32 = 90.0;

/// Phyllotaxis spiral around `center`, so unpositioned nodes never coincide.
fn seed_position(center: Vec2, index: usize) -> Vec2 {
    let radius = SEED_SPACING * (index as f32 + 0.5).sqrt();
    let angle = index as f32 * GOLDEN_ANGLE;
    center + Vec2::new(radius * angle.cos(), radius * angle.sin())
}

pub struct GraphModel {
    store: GraphStore,
    history: CommandLog,
    events: EventBus,
    title: Option<String>,
    seed_center: Vec2,
}

impl GraphModel {
    pub fn new(events: EventBus) -> Self {
        Self::with_settings(&EditorSettings::default(), events)
    }

    pub fn with_settings(settings: &EditorSettings, events: EventBus) -> Self {
        Self {
            store: GraphStore::new(NodeSizer::new(settings.sizing.clone()), events.clone()),
            history: CommandLog::new(settings.history_depth, events.clone()),
            events,
            title: None,
            seed_center: settings.layout.center,
        }
    }

    /// Replace the text measurer, e.g. with real font metrics from the host.
    pub fn set_sizer(&mut self, sizer: NodeSizer) {
        self.store.set_sizer(sizer);
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn sizer(&self) -> &NodeSizer {
        self.store.sizer()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.store.node(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.store.edge(id)
    }

    /// Insertion order, which is also draw order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.store.nodes()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.store.edges()
    }

    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.store.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.store.node_count() == 0
    }

    pub fn connected_edges(&self, id: &NodeId) -> Vec<&Edge> {
        self.store.edges().filter(|edge| edge.touches(id)).collect()
    }

    pub fn neighbors(&self, id: &NodeId) -> Vec<&NodeId> {
        self.store
            .edges()
            .filter_map(|edge| {
                if &edge.source_id == id {
                    Some(&edge.target_id)
                } else if &edge.target_id == id {
                    Some(&edge.source_id)
                } else {
                    None
                }
            })
            .collect()
    }

    /// The directed edge `source -> target`, if any.
    pub fn edge_between(&self, source: &NodeId, target: &NodeId) -> Option<&Edge> {
        self.store.find_edge(source, target)
    }

    /// The ACTIVE or EDITABLE node.
    pub fn active_node(&self) -> Option<&Node> {
        self.store.nodes().find(|node| node.state.is_focused())
    }

    pub fn selected_nodes(&self) -> Vec<&Node> {
        self.store
            .nodes()
            .filter(|node| node.state == NodeState::MultiSelected)
            .collect()
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        bounding_box(self.store.nodes().map(Node::rect))
    }

    // ------------------------------------------------------------------
    // Node mutations
    // ------------------------------------------------------------------

    pub fn create_node(&mut self, new: NewNode, recording: Recording) -> Option<Node> {
        if !(new.x.is_finite() && new.y.is_finite()) {
            tracing::debug!(x = new.x, y = new.y, "rejected node with non-finite position");
            return None;
        }
        let id = new.id.unwrap_or_else(NodeId::generate);
        if self.store.contains_node(&id) {
            tracing::debug!(%id, "rejected duplicate node id");
            return None;
        }

        let now = now_millis();
        let size = self.store.sizer().size_for(&new.text, NodeState::Inactive);
        let node = Node {
            id: id.clone(),
            text: new.text,
            x: new.x,
            y: new.y,
            w: size.x,
            h: size.y,
            state: NodeState::Inactive,
            created_at: new.created_at.unwrap_or(now),
            updated_at: new.updated_at.unwrap_or(now),
        };
        self.store.insert_node(node.clone());
        if recording == Recording::Record {
            self.history.push(UndoAction::CreateNode { node });
        }
        if new.state != NodeState::Inactive {
            self.set_node_state(&id, new.state);
        }
        self.store.node(&id).cloned()
    }

    /// Removes the node and all incident edges as one undoable step.
    pub fn delete_node(&mut self, id: &NodeId, recording: Recording) -> Option<Node> {
        let (node, edges) = self.store.remove_node(id)?;
        if recording == Recording::Record {
            self.history.push(UndoAction::DeleteNode {
                node: node.clone(),
                edges,
            });
        }
        Some(node)
    }

    pub fn move_node(&mut self, id: &NodeId, x: f32, y: f32, recording: Recording) -> Option<Node> {
        if !(x.is_finite() && y.is_finite()) {
            tracing::debug!(%id, x, y, "rejected non-finite move");
            return None;
        }
        let to = Vec2::new(x, y);
        let from = self.store.set_position(id, to)?;
        if recording == Recording::Record && from != to {
            self.history.push(UndoAction::MoveNode {
                id: id.clone(),
                from,
                to,
            });
        }
        self.store.node(id).cloned()
    }

    /// Record a move that already happened silently (e.g. a drag) as one step.
    pub fn commit_move(&mut self, id: &NodeId, from: Vec2) -> bool {
        let Some(to) = self.store.node(id).map(Node::center) else {
            return false;
        };
        if from == to {
            return false;
        }
        self.history.push(UndoAction::MoveNode {
            id: id.clone(),
            from,
            to,
        });
        true
    }

    pub fn update_node_text(&mut self, id: &NodeId, text: &str, recording: Recording) -> Option<Node> {
        let from = self.store.set_text(id, text)?;
        if recording == Recording::Record && from != text {
            self.history.push(UndoAction::UpdateNodeText {
                id: id.clone(),
                from,
                to: text.to_string(),
            });
        }
        self.store.node(id).cloned()
    }

    /// Validated state change; never recorded. Focusing a node unfocuses any other.
    pub fn set_node_state(&mut self, id: &NodeId, state: NodeState) -> Option<Node> {
        let current = self.store.node(id)?.state;
        if !current.can_transition_to(state) {
            tracing::debug!(%id, from = %current, to = %state, "rejected state transition");
            return None;
        }
        if state.is_focused() {
            let others: Vec<NodeId> = self
                .store
                .nodes()
                .filter(|node| node.state.is_focused() && &node.id != id)
                .map(|node| node.id.clone())
                .collect();
            for other in others {
                self.release_focus(&other);
            }
            self.clear_multi_selection();
        }
        self.store.set_state(id, state);
        self.store.node(id).cloned()
    }

    /// Positions from the layout engine: no events, no history.
    pub fn apply_layout_positions<'a, I>(&mut self, positions: I) -> usize
    where
        I: IntoIterator<Item = (&'a NodeId, Vec2)>,
    {
        positions
            .into_iter()
            .filter(|(id, pos)| pos.is_finite() && self.store.set_position_quiet(id, *pos))
            .count()
    }

    // ------------------------------------------------------------------
    // Edge mutations
    // ------------------------------------------------------------------

    pub fn create_edge(
        &mut self,
        source: &NodeId,
        target: &NodeId,
        label: Option<String>,
        recording: Recording,
    ) -> Option<Edge> {
        let mut new = NewEdge::new(source.clone(), target.clone());
        new.label = label;
        self.create_edge_with(new, recording)
    }

    /// Rejects self-loops, unknown endpoints and duplicate `source -> target` pairs.
    pub fn create_edge_with(&mut self, new: NewEdge, recording: Recording) -> Option<Edge> {
        let edge = Edge {
            id: new.id.unwrap_or_else(EdgeId::generate),
            source_id: new.source_id,
            target_id: new.target_id,
            label: normalize_label(new.label),
            control_points: Vec::new(),
            style: new.style,
        };
        if let Err(rejection) = self.store.insert_edge(edge.clone()) {
            tracing::debug!(
                source = %edge.source_id,
                target = %edge.target_id,
                ?rejection,
                "rejected edge"
            );
            return None;
        }
        if recording == Recording::Record {
            self.history.push(UndoAction::CreateEdge { edge: edge.clone() });
        }
        Some(edge)
    }

    pub fn delete_edge(&mut self, id: &EdgeId, recording: Recording) -> Option<Edge> {
        let edge = self.store.remove_edge(id)?;
        if recording == Recording::Record {
            self.history.push(UndoAction::DeleteEdge { edge: edge.clone() });
        }
        Some(edge)
    }

    /// Blank labels are stored as no label.
    pub fn update_edge_label(
        &mut self,
        id: &EdgeId,
        label: Option<String>,
        recording: Recording,
    ) -> Option<Edge> {
        let label = normalize_label(label);
        let from = self.store.set_label(id, label.clone())?;
        if recording == Recording::Record && from != label {
            self.history.push(UndoAction::UpdateEdgeLabel {
                id: id.clone(),
                from,
                to: label,
            });
        }
        self.store.edge(id).cloned()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Make `id` the single ACTIVE node. A previously focused node that was
    /// being edited and is still empty is discarded.
    pub fn activate_node(&mut self, id: &NodeId) -> Option<Node> {
        if !self.store.contains_node(id) {
            return None;
        }
        let previous = self
            .active_node()
            .filter(|node| &node.id != id)
            .map(|node| node.id.clone());
        if let Some(previous) = previous {
            self.release_focus(&previous);
        }
        self.clear_multi_selection();
        self.set_node_state(id, NodeState::Active)
    }

    pub fn begin_editing(&mut self, id: &NodeId) -> Option<Node> {
        let state = self.store.node(id)?.state;
        if state != NodeState::Active && state != NodeState::Editable {
            self.activate_node(id)?;
        }
        self.set_node_state(id, NodeState::Editable)
    }

    /// Commit `text` and return to ACTIVE. Empty text discards the node.
    pub fn finish_editing(&mut self, id: &NodeId, text: &str) -> Option<Node> {
        let state = self.store.node(id)?.state;
        if state != NodeState::Editable {
            tracing::debug!(%id, %state, "finish_editing on a node that is not being edited");
            return None;
        }
        if text.trim().is_empty() {
            self.discard_empty(id);
            return None;
        }
        if self.store.node(id).is_some_and(|node| node.text != text) {
            self.update_node_text(id, text, Recording::Record);
        }
        self.set_node_state(id, NodeState::Active)
    }

    /// Leave editing without committing. Nodes that never got text are discarded.
    pub fn cancel_editing(&mut self, id: &NodeId) -> Option<Node> {
        let node = self.store.node(id)?;
        if node.state != NodeState::Editable {
            return Some(node.clone());
        }
        if node.text.trim().is_empty() {
            self.discard_empty(id);
            return None;
        }
        self.set_node_state(id, NodeState::Active)
    }

    /// Return every focused or multi-selected node to INACTIVE.
    pub fn deactivate_all(&mut self) {
        let selected: Vec<NodeId> = self
            .store
            .nodes()
            .filter(|node| node.state != NodeState::Inactive)
            .map(|node| node.id.clone())
            .collect();
        for id in selected {
            self.release_focus(&id);
        }
    }

    /// Multi-select every node whose box intersects `rect`.
    pub fn select_in_rect(&mut self, rect: Rect) -> Vec<NodeId> {
        self.deactivate_all();
        let hits: Vec<NodeId> = self
            .store
            .nodes()
            .filter(|node| rects_intersect(&node.rect(), &rect))
            .map(|node| node.id.clone())
            .collect();
        for id in &hits {
            self.store.set_state(id, NodeState::MultiSelected);
        }
        hits
    }

    fn clear_multi_selection(&mut self) {
        let selected: Vec<NodeId> = self
            .selected_nodes()
            .into_iter()
            .map(|node| node.id.clone())
            .collect();
        for id in selected {
            self.store.set_state(&id, NodeState::Inactive);
        }
    }

    fn release_focus(&mut self, id: &NodeId) {
        let Some(node) = self.store.node(id) else {
            return;
        };
        if node.state == NodeState::Editable && node.text.trim().is_empty() {
            self.discard_empty(id);
        } else {
            self.store.set_state(id, NodeState::Inactive);
        }
    }

    /// Drop an abandoned empty node. If its creation is the newest history
    /// entry the entry goes too, so undo never resurrects a blank node.
    fn discard_empty(&mut self, id: &NodeId) {
        let recording = if self.history.discard_created(id) {
            Recording::Silent
        } else {
            Recording::Record
        };
        tracing::debug!(%id, "discarding empty node");
        self.delete_node(id, recording);
    }

    /// Delete the focused node and every multi-selected node in one step.
    pub fn delete_selected(&mut self) -> usize {
        let ids: Vec<NodeId> = self
            .store
            .nodes()
            .filter(|node| node.state != NodeState::Inactive)
            .map(|node| node.id.clone())
            .collect();
        if ids.is_empty() {
            return 0;
        }
        let description = if ids.len() == 1 {
            "Delete node".to_string()
        } else {
            format!("Delete {} nodes", ids.len())
        };
        self.transaction(description, |model| {
            ids.iter()
                .filter(|id| model.delete_node(id, Recording::Record).is_some())
                .count()
        })
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Group every recorded mutation made by `f` into one undo entry.
    pub fn transaction<R>(&mut self, description: impl Into<String>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.history.begin_batch(description);
        let result = f(self);
        self.history.end_batch();
        result
    }

    pub fn undo(&mut self) -> Result<Option<String>, HistoryError> {
        self.history.undo(&mut self.store)
    }

    pub fn redo(&mut self) -> Result<Option<String>, HistoryError> {
        self.history.redo(&mut self.store)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &CommandLog {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut CommandLog {
        &mut self.history
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Remove everything, including undo history.
    pub fn clear(&mut self) {
        self.store.clear();
        self.history.clear();
        self.events.publish(Event::GraphCleared);
    }

    /// Replace the graph with `data`. Not undoable: the loaded document is
    /// the new history baseline.
    pub fn load_from_data(&mut self, data: &DocumentData) -> LoadReport {
        self.clear();
        self.title = data.title.clone();

        let mut report = LoadReport::default();
        for (index, record) in data.nodes.iter().enumerate() {
            let pos = match (record.x, record.y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Vec2::new(x, y),
                _ => seed_position(self.seed_center, index),
            };
            let new = NewNode {
                id: Some(record.id.clone()),
                text: record.text.clone(),
                x: pos.x,
                y: pos.y,
                state: NodeState::Inactive,
                created_at: record.created_at,
                updated_at: record.updated_at,
            };
            match self.create_node(new, Recording::Silent) {
                Some(_) => report.nodes_loaded += 1,
                None => report.nodes_rejected += 1,
            }
        }

        for record in &data.edges {
            let new = NewEdge {
                id: record.id.clone(),
                source_id: record.source_id.clone(),
                target_id: record.target_id.clone(),
                label: record.label.clone(),
                style: EdgeStyle::default(),
            };
            match self.create_edge_with(new, Recording::Silent) {
                Some(_) => report.edges_loaded += 1,
                None => report.edges_rejected += 1,
            }
        }

        tracing::info!(
            nodes = report.nodes_loaded,
            edges = report.edges_loaded,
            rejected_nodes = report.nodes_rejected,
            rejected_edges = report.edges_rejected,
            "loaded document"
        );
        self.events.publish(Event::GraphLoaded {
            node_count: report.nodes_loaded,
            edge_count: report.edges_loaded,
        });
        report
    }

    pub fn load_json(&mut self, json: &str) -> Result<LoadReport, DocumentError> {
        let data = DocumentData::from_json_str(json)?;
        Ok(self.load_from_data(&data))
    }

    /// Snapshot as a document. Positions are included only with `include_layout`.
    pub fn to_document(&self, include_layout: bool) -> DocumentData {
        DocumentData {
            title: self.title.clone(),
            nodes: self
                .store
                .nodes()
                .map(|node| NodeRecord {
                    id: node.id.clone(),
                    text: node.text.clone(),
                    created_at: Some(node.created_at),
                    updated_at: Some(node.updated_at),
                    x: include_layout.then_some(node.x),
                    y: include_layout.then_some(node.y),
                })
                .collect(),
            edges: self
                .store
                .edges()
                .map(|edge| EdgeRecord {
                    id: Some(edge.id.clone()),
                    source_id: edge.source_id.clone(),
                    target_id: edge.target_id.clone(),
                    label: edge.label.clone(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self, include_layout: bool) -> Result<String, DocumentError> {
        self.to_document(include_layout).to_json_pretty()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Create(f32, f32),
        Delete(usize),
        Move(usize, f32, f32),
        Connect(usize, usize),
        Text(usize, String),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-500.0f32..500.0, -500.0f32..500.0).prop_map(|(x, y)| Op::Create(x, y)),
            (0usize..8).prop_map(Op::Delete),
            (0usize..8, -500.0f32..500.0, -500.0f32..500.0).prop_map(|(i, x, y)| Op::Move(i, x, y)),
            (0usize..8, 0usize..8).prop_map(|(a, b)| Op::Connect(a, b)),
            (0usize..8, "[a-z ]{0,40}").prop_map(|(i, t)| Op::Text(i, t)),
        ]
    }

    fn pick(model: &GraphModel, index: usize) -> Option<NodeId> {
        let count = model.node_count();
        (count > 0).then(|| model.nodes().nth(index % count).map(|n| n.id.clone())).flatten()
    }

    fn snapshot(model: &GraphModel) -> DocumentData {
        model.to_document(true)
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_and_undo_restores(ops in proptest::collection::vec(op(), 1..30)) {
            let settings = EditorSettings { history_depth: 100, ..EditorSettings::default() };
            let mut m = GraphModel::with_settings(&settings, EventBus::new());
            let mut snapshots = vec![snapshot(&m)];

            for op in ops {
                let before = m.history().undo_len();
                match op {
                    Op::Create(x, y) => { m.create_node(NewNode::at(x, y), Recording::Record); }
                    Op::Delete(i) => if let Some(id) = pick(&m, i) { m.delete_node(&id, Recording::Record); },
                    Op::Move(i, x, y) => if let Some(id) = pick(&m, i) { m.move_node(&id, x, y, Recording::Record); },
                    Op::Connect(a, b) => if let (Some(a), Some(b)) = (pick(&m, a), pick(&m, b)) {
                        m.create_edge(&a, &b, None, Recording::Record);
                    },
                    Op::Text(i, t) => if let Some(id) = pick(&m, i) { m.update_node_text(&id, &t, Recording::Record); },
                }
                if m.history().undo_len() > before {
                    snapshots.push(snapshot(&m));
                }

                for edge in m.edges() {
                    prop_assert!(edge.source_id != edge.target_id);
                    prop_assert!(m.node(&edge.source_id).is_some());
                    prop_assert!(m.node(&edge.target_id).is_some());
                }
                for node in m.nodes() {
                    prop_assert!(node.w >= 80.0 && node.h >= 40.0);
                }
            }

            // Undo everything and compare against the snapshot taken before each step.
            prop_assert_eq!(m.history().undo_len() + 1, snapshots.len());
            for expected in snapshots.iter().rev().skip(1) {
                m.undo().unwrap();
                let actual = snapshot(&m);
                prop_assert_eq!(actual.nodes.len(), expected.nodes.len());
                prop_assert_eq!(actual.edges.len(), expected.edges.len());
                for node in &expected.nodes {
                    let restored = m.node(&node.id);
                    prop_assert!(restored.is_some());
                    let restored = restored.unwrap();
                    prop_assert_eq!(&restored.text, &node.text);
                    prop_assert_eq!(Some(restored.x), node.x);
                    prop_assert_eq!(Some(restored.y), node.y);
                }
            }
        }
    }
}
