use nodeweave_core::{Node, Rect, Vec2};

use crate::geometry::{polyline_distance, quadratic_point, rect_edge_point};
use crate::settings::ViewConfig;

/// Samples used when measuring pointer distance to a curve.
pub const HIT_SAMPLES: usize = 24;

/// A quadratic bezier edge path between two node boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgePath {
    pub start: Vec2,
    pub control: Vec2,
    pub end: Vec2,
}

impl EdgePath {
    pub fn straight(start: Vec2, end: Vec2) -> Self {
        Self {
            start,
            control: start.lerp(end, 0.5),
            end,
        }
    }

    /// Sample the curve at parameter t [0, 1]
    pub fn sample(&self, t: f32) -> Vec2 {
        quadratic_point(self.start, self.control, self.end, t)
    }

    /// Curve midpoint, where the label sits.
    pub fn midpoint(&self) -> Vec2 {
        self.sample(0.5)
    }

    pub fn polyline(&self, samples: usize) -> Vec<Vec2> {
        let samples = samples.max(1);
        (0..=samples)
            .map(|i| self.sample(i as f32 / samples as f32))
            .collect()
    }

    /// Minimum distance from `point` to the sampled curve.
    pub fn point_distance(&self, point: Vec2, samples: usize) -> f32 {
        polyline_distance(point, &self.polyline(samples))
    }

    /// Conservative bounds: the control polygon contains the curve.
    pub fn bounds(&self) -> Rect {
        Rect::from_corners(self.start, self.end).union(&Rect::from_corners(self.control, self.control))
    }
}

/// Computes boundary-anchored curved paths between nodes.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRouter {
    /// Gap between a node's box and the edge endpoint.
    pub anchor_padding: f32,
    /// Perpendicular bow as a fraction of the anchor distance.
    pub curve_factor: f32,
    pub max_curve_offset: f32,
}

impl Default for EdgeRouter {
    fn default() -> Self {
        Self::from_config(&ViewConfig::default())
    }
}

impl EdgeRouter {
    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            anchor_padding: config.edge_anchor_padding,
            curve_factor: config.curve_factor,
            max_curve_offset: config.max_curve_offset,
        }
    }

    /// Route `source -> target`. Opposite directions bow to opposite sides.
    pub fn route_edge(&self, source: &Node, target: &Node) -> EdgePath {
        let start = self.calculate_anchor(source, target.center());
        let end = self.calculate_anchor(target, source.center());
        self.calculate_curve(start, end)
    }

    /// Straight path from a node toward a free point, for connection previews.
    pub fn route_to_point(&self, source: &Node, point: Vec2) -> EdgePath {
        EdgePath::straight(self.calculate_anchor(source, point), point)
    }

    pub fn calculate_anchor(&self, node: &Node, toward: Vec2) -> Vec2 {
        rect_edge_point(node.center(), toward, node.w, node.h, self.anchor_padding)
    }

    fn calculate_curve(&self, start: Vec2, end: Vec2) -> EdgePath {
        let chord = end - start;
        let length = chord.length();
        let offset = (length * self.curve_factor).min(self.max_curve_offset);
        let control = start.lerp(end, 0.5) + chord.normalized().perp() * offset;
        EdgePath {
            start,
            control,
            end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeweave_core::{NodeId, NodeState};
    use proptest::prelude::*;

    fn node(x: f32, y: f32, w: f32, h: f32) -> Node {
        Node {
            id: NodeId::generate(),
            text: String::new(),
            x,
            y,
            w,
            h,
            state: NodeState::Inactive,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn is_on_border(p: Vec2, n: &Node, padding: f32, epsilon: f32) -> bool {
        let r = n.rect().expand(padding);
        let on_x = (p.x - r.min.x).abs() < epsilon || (p.x - r.max.x).abs() < epsilon;
        let on_y = (p.y - r.min.y).abs() < epsilon || (p.y - r.max.y).abs() < epsilon;
        let in_x = p.x >= r.min.x - epsilon && p.x <= r.max.x + epsilon;
        let in_y = p.y >= r.min.y - epsilon && p.y <= r.max.y + epsilon;
        (on_x && in_y) || (on_y && in_x)
    }

    #[test]
    fn test_horizontal_route_anchors_on_facing_sides() {
        let router = EdgeRouter::default();
        let a = node(0.0, 0.0, 100.0, 40.0);
        let b = node(400.0, 0.0, 100.0, 40.0);
        let path = router.route_edge(&a, &b);
        assert_eq!(path.start, Vec2::new(54.0, 0.0));
        assert_eq!(path.end, Vec2::new(346.0, 0.0));
        // 292 * 0.15 = 43.8, capped at 40
        assert!((path.control.y - 40.0).abs() < 1e-3);
        assert!((path.midpoint().y - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_opposite_edges_do_not_overlap() {
        let router = EdgeRouter::default();
        let a = node(0.0, 0.0, 80.0, 40.0);
        let b = node(300.0, 100.0, 80.0, 40.0);
        let forward = router.route_edge(&a, &b);
        let backward = router.route_edge(&b, &a);
        assert!(forward.midpoint().distance(backward.midpoint()) > 10.0);
    }

    #[test]
    fn test_coincident_nodes_do_not_produce_nan() {
        let router = EdgeRouter::default();
        let a = node(10.0, 10.0, 80.0, 40.0);
        let b = node(10.0, 10.0, 80.0, 40.0);
        let path = router.route_edge(&a, &b);
        assert!(path.start.is_finite() && path.control.is_finite() && path.end.is_finite());
    }

    #[test]
    fn test_point_distance() {
        let path = EdgePath::straight(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0));
        assert!((path.point_distance(Vec2::new(50.0, 7.0), HIT_SAMPLES) - 7.0).abs() < 1e-3);
        assert!(path.bounds().contains(Vec2::new(50.0, 0.0)));
    }

    fn node_strategy() -> impl Strategy<Value = Node> {
        (
            -1000.0f32..1000.0,
            -1000.0f32..1000.0,
            20.0f32..300.0,
            20.0f32..200.0,
        )
            .prop_map(|(x, y, w, h)| node(x, y, w, h))
    }

    proptest! {
        #[test]
        fn prop_route_starts_and_ends_on_anchors(a in node_strategy(), b in node_strategy()) {
            prop_assume!(a.center().distance(b.center()) > 1.0);
            let router = EdgeRouter::default();
            let path = router.route_edge(&a, &b);
            prop_assert!(is_on_border(path.start, &a, router.anchor_padding, 0.05));
            prop_assert!(is_on_border(path.end, &b, router.anchor_padding, 0.05));
            prop_assert_eq!(path.sample(0.0), path.start);
            prop_assert_eq!(path.sample(1.0), path.end);
        }

        #[test]
        fn prop_control_offset_is_capped(a in node_strategy(), b in node_strategy()) {
            let router = EdgeRouter::default();
            let path = router.route_edge(&a, &b);
            let mid = path.start.lerp(path.end, 0.5);
            prop_assert!(path.control.distance(mid) <= router.max_curve_offset + 1e-3);
        }
    }
}
