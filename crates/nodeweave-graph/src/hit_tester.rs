use nodeweave_core::{EdgeId, NodeId, Rect, Vec2};

use crate::edge_router::{EdgePath, HIT_SAMPLES};

/// Result of a hit test at a given position.
///
/// Nodes take priority over edges.
#[derive(Debug, Clone, PartialEq)]
pub enum HitResult {
    None,
    Node(NodeId),
    Edge(EdgeId),
}

/// Spatial lookup over the last rendered frame, in canvas coordinates.
#[derive(Debug, Clone)]
pub struct HitTester {
    /// Draw order: later entries are on top.
    node_rects: Vec<(NodeId, Rect)>,
    edge_paths: Vec<(EdgeId, EdgePath)>,
    /// Canvas units; callers divide screen tolerance by the zoom scale.
    edge_tolerance: f32,
    samples: usize,
}

impl Default for HitTester {
    fn default() -> Self {
        Self::new()
    }
}

impl HitTester {
    pub fn new() -> Self {
        Self {
            node_rects: Vec::new(),
            edge_paths: Vec::new(),
            edge_tolerance: 15.0,
            samples: HIT_SAMPLES,
        }
    }

    pub fn with_tolerance(tolerance: f32) -> Self {
        Self {
            edge_tolerance: tolerance,
            ..Self::new()
        }
    }

    pub fn edge_tolerance(&self) -> f32 {
        self.edge_tolerance
    }

    pub fn set_edge_tolerance(&mut self, tolerance: f32) {
        self.edge_tolerance = tolerance.max(0.0);
    }

    pub fn clear(&mut self) {
        self.node_rects.clear();
        self.edge_paths.clear();
    }

    pub fn push_node(&mut self, id: NodeId, rect: Rect) {
        self.node_rects.push((id, rect));
    }

    pub fn push_edge(&mut self, id: EdgeId, path: EdgePath) {
        self.edge_paths.push((id, path));
    }

    pub fn hit_test(&self, point: Vec2) -> HitResult {
        if let Some(id) = self.hit_node(point) {
            return HitResult::Node(id.clone());
        }
        if let Some(id) = self.hit_edge(point) {
            return HitResult::Edge(id.clone());
        }
        HitResult::None
    }

    /// Topmost node containing `point`.
    pub fn hit_node(&self, point: Vec2) -> Option<&NodeId> {
        self.node_rects
            .iter()
            .rev()
            .find(|(_, rect)| rect.contains(point))
            .map(|(id, _)| id)
    }

    /// Nearest edge within tolerance.
    pub fn hit_edge(&self, point: Vec2) -> Option<&EdgeId> {
        let tolerance = self.edge_tolerance;
        self.edge_paths
            .iter()
            .filter(|(_, path)| path.bounds().expand(tolerance).contains(point))
            .map(|(id, path)| (id, path.point_distance(point, self.samples)))
            .filter(|(_, distance)| *distance <= tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    pub fn nodes_in_rect(&self, rect: &Rect) -> Vec<&NodeId> {
        self.node_rects
            .iter()
            .filter(|(_, node_rect)| node_rect.intersects(rect))
            .map(|(id, _)| id)
            .collect()
    }
}
