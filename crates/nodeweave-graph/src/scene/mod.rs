//! Retained scene: keyed elements reconciled against the model on every render.

pub mod pointer;
pub mod view;

use std::collections::HashMap;

use indexmap::IndexMap;
use indexmap::map::Entry;
use nodeweave_core::{Edge, EdgeId, EdgeStyle, Node, NodeId, NodeState, Rect, Vec2};
use nodeweave_events::{Event, EventBus};

use crate::edge_router::{EdgePath, EdgeRouter};
use crate::hit_tester::{HitResult, HitTester};
use crate::model::GraphModel;
use crate::settings::ViewConfig;
use crate::sizing::NodeSizer;

pub use pointer::{Intent, Modifiers, PointerButton, PointerTarget, PointerTracker};
pub use view::{MAX_SCALE, MIN_SCALE, ViewTransform};

/// Stable handle of a rendered element. Never reused within one renderer.
pub type ElementKey = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeElement {
    pub key: ElementKey,
    pub id: NodeId,
    /// Canvas space.
    pub rect: Rect,
    pub lines: Vec<String>,
    pub state: NodeState,
    pub draggable: bool,
    pub dragging: bool,
}

impl NodeElement {
    fn same_content(&self, other: &NodeElement) -> bool {
        self.rect == other.rect
            && self.lines == other.lines
            && self.state == other.state
            && self.draggable == other.draggable
            && self.dragging == other.dragging
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabelDisplay {
    Hidden,
    Badge { text: String, at: Vec2 },
    Full { text: String, at: Vec2 },
}

impl LabelDisplay {
    pub fn text(&self) -> Option<&str> {
        match self {
            LabelDisplay::Hidden => None,
            LabelDisplay::Badge { text, .. } | LabelDisplay::Full { text, .. } => Some(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeElement {
    pub key: ElementKey,
    pub id: EdgeId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub path: EdgePath,
    pub label: LabelDisplay,
    /// Touches the active node.
    pub highlighted: bool,
    pub selected: bool,
    pub style: EdgeStyle,
}

impl EdgeElement {
    fn same_content(&self, other: &EdgeElement) -> bool {
        self.source_id == other.source_id
            && self.target_id == other.target_id
            && self.path == other.path
            && self.label == other.label
            && self.highlighted == other.highlighted
            && self.selected == other.selected
            && self.style == other.style
    }
}

/// Rubber-band line from a node to the pointer while connecting.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgePreview {
    pub source_id: NodeId,
    pub path: EdgePath,
}

/// Transient UI state the model does not own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionState {
    pub selected_edge: Option<EdgeId>,
    pub dragging: Option<NodeId>,
    /// Source node and pointer position in canvas space.
    pub edge_preview: Option<(NodeId, Vec2)>,
    pub marquee: Option<Rect>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub skipped_edges: usize,
}

impl RenderStats {
    pub fn changed(&self) -> bool {
        self.created + self.updated + self.removed > 0
    }
}

/// Which label an edge shows given the current focus.
pub fn label_display(
    edge: &Edge,
    path: &EdgePath,
    active: Option<&NodeId>,
    selected_edge: Option<&EdgeId>,
    badge: &str,
) -> LabelDisplay {
    if !edge.has_label() {
        return LabelDisplay::Hidden;
    }
    let focused = active.is_some_and(|id| edge.touches(id)) || selected_edge == Some(&edge.id);
    let at = path.midpoint();
    match (focused, edge.label.as_deref()) {
        (true, Some(label)) => LabelDisplay::Full {
            text: label.to_string(),
            at,
        },
        _ => LabelDisplay::Badge {
            text: badge.to_string(),
            at,
        },
    }
}

#[derive(Debug)]
pub struct SceneRenderer {
    view: ViewTransform,
    viewport: Vec2,
    config: ViewConfig,
    router: EdgeRouter,
    node_elements: IndexMap<NodeId, NodeElement>,
    edge_elements: IndexMap<EdgeId, EdgeElement>,
    preview: Option<EdgePreview>,
    marquee: Option<Rect>,
    hit_tester: HitTester,
    pointer: PointerTracker,
    next_key: ElementKey,
    frame: u64,
    events: EventBus,
    disposed: bool,
}

impl SceneRenderer {
    pub fn new(config: ViewConfig, viewport: Vec2, events: EventBus) -> Self {
        Self {
            view: ViewTransform::default(),
            viewport,
            router: EdgeRouter::from_config(&config),
            hit_tester: HitTester::with_tolerance(config.edge_hit_tolerance),
            pointer: PointerTracker::new(config.drag_threshold),
            config,
            node_elements: IndexMap::new(),
            edge_elements: IndexMap::new(),
            preview: None,
            marquee: None,
            next_key: 1,
            frame: 0,
            events,
            disposed: false,
        }
    }

    pub fn view(&self) -> ViewTransform {
        self.view
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn router(&self) -> &EdgeRouter {
        &self.router
    }

    /// Number of completed renders.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn node_elements(&self) -> impl Iterator<Item = &NodeElement> {
        self.node_elements.values()
    }

    pub fn edge_elements(&self) -> impl Iterator<Item = &EdgeElement> {
        self.edge_elements.values()
    }

    pub fn node_element(&self, id: &NodeId) -> Option<&NodeElement> {
        self.node_elements.get(id)
    }

    pub fn edge_element(&self, id: &EdgeId) -> Option<&EdgeElement> {
        self.edge_elements.get(id)
    }

    pub fn preview(&self) -> Option<&EdgePreview> {
        self.preview.as_ref()
    }

    pub fn marquee(&self) -> Option<Rect> {
        self.marquee
    }

    pub fn render(&mut self, model: &GraphModel, interaction: &InteractionState) -> RenderStats {
        self.render_graph(model.nodes(), model.edges(), model.sizer(), interaction)
    }

    /// Reconcile elements against `nodes`/`edges` by id.
    ///
    /// Existing elements keep their key and are patched in place; edges whose
    /// endpoints are missing are skipped.
    pub fn render_graph<'a>(
        &mut self,
        nodes: impl IntoIterator<Item = &'a Node>,
        edges: impl IntoIterator<Item = &'a Edge>,
        sizer: &NodeSizer,
        interaction: &InteractionState,
    ) -> RenderStats {
        let mut stats = RenderStats::default();
        if self.disposed {
            return stats;
        }

        let nodes: Vec<&Node> = nodes.into_iter().collect();
        let lookup: HashMap<&NodeId, &Node> = nodes.iter().map(|node| (&node.id, *node)).collect();
        let active = nodes
            .iter()
            .find(|node| node.state.is_focused())
            .map(|node| &node.id);

        let before = self.node_elements.len();
        self.node_elements.retain(|id, _| lookup.contains_key(id));
        stats.removed += before - self.node_elements.len();

        for node in nodes.iter().copied() {
            let element = NodeElement {
                key: 0,
                id: node.id.clone(),
                rect: node.rect(),
                lines: sizer.display_lines(&node.text, node.state),
                state: node.state,
                draggable: node.state != NodeState::Editable,
                dragging: interaction.dragging.as_ref() == Some(&node.id),
            };
            match self.node_elements.entry(node.id.clone()) {
                Entry::Occupied(mut slot) => {
                    let current = slot.get_mut();
                    if current.same_content(&element) {
                        stats.unchanged += 1;
                    } else {
                        *current = NodeElement {
                            key: current.key,
                            ..element
                        };
                        stats.updated += 1;
                    }
                }
                Entry::Vacant(slot) => {
                    let key = self.next_key;
                    self.next_key += 1;
                    slot.insert(NodeElement { key, ..element });
                    stats.created += 1;
                }
            }
        }

        let mut seen_edges: Vec<EdgeId> = Vec::new();
        for edge in edges {
            let (Some(source), Some(target)) = (lookup.get(&edge.source_id), lookup.get(&edge.target_id)) else {
                tracing::trace!(edge = %edge.id, "skipping edge with missing endpoint");
                stats.skipped_edges += 1;
                continue;
            };
            seen_edges.push(edge.id.clone());
            let path = self.router.route_edge(source, target);
            let element = EdgeElement {
                key: 0,
                id: edge.id.clone(),
                source_id: edge.source_id.clone(),
                target_id: edge.target_id.clone(),
                label: label_display(
                    edge,
                    &path,
                    active,
                    interaction.selected_edge.as_ref(),
                    &self.config.label_badge,
                ),
                path,
                highlighted: active.is_some_and(|id| edge.touches(id)),
                selected: interaction.selected_edge.as_ref() == Some(&edge.id),
                style: edge.style,
            };
            match self.edge_elements.entry(edge.id.clone()) {
                Entry::Occupied(mut slot) => {
                    let current = slot.get_mut();
                    if current.same_content(&element) {
                        stats.unchanged += 1;
                    } else {
                        *current = EdgeElement {
                            key: current.key,
                            ..element
                        };
                        stats.updated += 1;
                    }
                }
                Entry::Vacant(slot) => {
                    let key = self.next_key;
                    self.next_key += 1;
                    slot.insert(EdgeElement { key, ..element });
                    stats.created += 1;
                }
            }
        }
        let before = self.edge_elements.len();
        if before != seen_edges.len() {
            let seen: std::collections::HashSet<&EdgeId> = seen_edges.iter().collect();
            self.edge_elements.retain(|id, _| seen.contains(id));
            stats.removed += before - self.edge_elements.len();
        }

        self.preview = interaction.edge_preview.as_ref().and_then(|(source_id, to)| {
            lookup.get(source_id).map(|source| EdgePreview {
                source_id: source_id.clone(),
                path: self.router.route_to_point(source, *to),
            })
        });
        self.marquee = interaction.marquee;

        self.rebuild_hit_tester();
        self.frame += 1;
        tracing::trace!(
            frame = self.frame,
            created = stats.created,
            updated = stats.updated,
            removed = stats.removed,
            "scene rendered"
        );
        stats
    }

    fn rebuild_hit_tester(&mut self) {
        self.hit_tester.clear();
        self.hit_tester
            .set_edge_tolerance(self.config.edge_hit_tolerance / self.view.scale);
        for element in self.node_elements.values() {
            self.hit_tester.push_node(element.id.clone(), element.rect);
        }
        for element in self.edge_elements.values() {
            self.hit_tester.push_edge(element.id.clone(), element.path);
        }
    }

    pub fn screen_to_canvas(&self, screen: Vec2) -> Vec2 {
        self.view.screen_to_canvas(screen)
    }

    pub fn canvas_to_screen(&self, canvas: Vec2) -> Vec2 {
        self.view.canvas_to_screen(canvas)
    }

    /// Hit test at a screen position against the last rendered frame.
    pub fn hit_test(&self, screen: Vec2) -> HitResult {
        self.hit_tester.hit_test(self.screen_to_canvas(screen))
    }

    /// Nodes whose rendered rect intersects `rect` (canvas space).
    pub fn nodes_in_rect(&self, rect: &Rect) -> Vec<NodeId> {
        self.hit_tester.nodes_in_rect(rect).into_iter().cloned().collect()
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        if width.is_finite() && height.is_finite() {
            self.viewport = Vec2::new(width.max(1.0), height.max(1.0));
        }
    }

    pub fn set_view(&mut self, view: ViewTransform) {
        let scale = view.scale.clamp(self.config.min_scale, self.config.max_scale);
        self.view = ViewTransform { scale, ..view };
        self.view_changed();
    }

    pub fn pan_by(&mut self, screen_delta: Vec2) {
        self.view.pan_by(screen_delta);
        self.view_changed();
    }

    pub fn zoom_at(&mut self, factor: f32, anchor: Vec2) {
        self.view
            .zoom_at(factor, anchor, self.config.min_scale, self.config.max_scale);
        self.view_changed();
    }

    /// Wheel zoom: one notch per unit of `delta_y`, negative zooms in.
    pub fn wheel(&mut self, delta_y: f32, anchor: Vec2) {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return;
        }
        let factor = self.config.zoom_step.powf(-delta_y.signum());
        self.zoom_at(factor, anchor);
    }

    /// Fit all nodes into the viewport minus padding without zooming past 1:1.
    /// Returns false for an empty graph.
    pub fn fit_view(&mut self, model: &GraphModel) -> bool {
        let Some(bounds) = model.bounding_box() else {
            return false;
        };
        self.fit_rect(bounds);
        true
    }

    pub fn fit_rect(&mut self, bounds: Rect) {
        let padding = self.config.fit_padding;
        let available = Vec2::new(
            (self.viewport.x - 2.0 * padding).max(1.0),
            (self.viewport.y - 2.0 * padding).max(1.0),
        );
        let size = bounds.size();
        let scale = (available.x / size.x.max(1.0))
            .min(available.y / size.y.max(1.0))
            .min(1.0)
            .clamp(self.config.min_scale, self.config.max_scale);
        let center = bounds.center();
        self.view = ViewTransform {
            x: self.viewport.x / 2.0 - center.x * scale,
            y: self.viewport.y / 2.0 - center.y * scale,
            scale,
        };
        tracing::debug!(scale, "fit view");
        self.view_changed();
    }

    fn view_changed(&mut self) {
        self.hit_tester
            .set_edge_tolerance(self.config.edge_hit_tolerance / self.view.scale);
        self.events.publish(Event::ViewChanged {
            x: self.view.x,
            y: self.view.y,
            scale: self.view.scale,
        });
    }

    fn pointer_target(&self, screen: Vec2) -> PointerTarget {
        match self.hit_test(screen) {
            HitResult::Node(id) => match self.node_elements.get(&id) {
                Some(element) => PointerTarget::Node {
                    center: element.rect.center(),
                    editing: !element.draggable,
                    id,
                },
                None => PointerTarget::Canvas,
            },
            HitResult::Edge(id) => PointerTarget::Edge(id),
            HitResult::None => PointerTarget::Canvas,
        }
    }

    pub fn pointer_down(&mut self, screen: Vec2, button: PointerButton, modifiers: Modifiers) -> Vec<Intent> {
        let target = self.pointer_target(screen);
        let canvas = self.screen_to_canvas(screen);
        self.pointer.pointer_down(target, screen, canvas, button, modifiers)
    }

    pub fn pointer_move(&mut self, screen: Vec2) -> Vec<Intent> {
        let canvas = self.screen_to_canvas(screen);
        self.pointer.pointer_move(screen, canvas)
    }

    pub fn pointer_up(&mut self, screen: Vec2) -> Vec<Intent> {
        let target = self.pointer_target(screen);
        let canvas = self.screen_to_canvas(screen);
        self.pointer.pointer_up(target, canvas)
    }

    pub fn double_click(&mut self, screen: Vec2) -> Vec<Intent> {
        let target = self.pointer_target(screen);
        let canvas = self.screen_to_canvas(screen);
        self.pointer.double_click(target, canvas)
    }

    pub fn pointer_cancel(&mut self) -> Vec<Intent> {
        self.pointer.cancel()
    }

    /// Drop every element. Later renders are no-ops.
    pub fn dispose(&mut self) {
        self.node_elements.clear();
        self.edge_elements.clear();
        self.preview = None;
        self.marquee = None;
        self.hit_tester.clear();
        self.pointer.cancel();
        self.disposed = true;
    }
}
