use anyhow::Context;
use nodeweave_core::{EdgeId, NodeId, NodeState, Vec2};
use nodeweave_events::{Event, EventBus, EventListener};
use nodeweave_graph::{
    EditorSettings, ForceLayout, GraphModel, InteractionState, Intent, LoadReport, Modifiers,
    NewNode, PointerButton, Recording, RenderStats, SceneRenderer,
};
use std::time::Instant;

/// What one call to [`DiagramEditor::frame`] did.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub ticked: bool,
    /// `None` when nothing changed since the previous frame.
    pub rendered: Option<RenderStats>,
    /// Every event drained from the bus this frame, in publish order.
    pub events: Vec<Event>,
}

/// Folds a frame's events into the work the editor has to do.
#[derive(Default)]
struct FramePlan {
    render: bool,
    sync_layout: bool,
    reheat: bool,
    restart: bool,
    events: Vec<Event>,
}

impl EventListener for FramePlan {
    fn handle_event(&mut self, event: &Event) {
        match event {
            Event::GraphLoaded { .. } => {
                self.sync_layout = true;
                self.restart = true;
            }
            event if event.changes_structure() => {
                self.sync_layout = true;
                self.reheat = true;
            }
            // Moves from outside the simulation (drag, undo) must be copied in.
            Event::NodeMoved { .. } => self.sync_layout = true,
            _ => {}
        }
        self.render |= event.affects_scene();
        self.events.push(event.clone());
    }
}

/// Headless diagram editor: owns the model, the layout and the scene, and
/// turns pointer input into model mutations.
///
/// Hosts feed pointer events in and call [`frame`](Self::frame) on their
/// animation clock. Mutations never render synchronously; each frame renders
/// at most once.
pub struct DiagramEditor {
    settings: EditorSettings,
    events: EventBus,
    model: GraphModel,
    layout: ForceLayout,
    scene: SceneRenderer,
    interaction: InteractionState,
    drag_origin: Option<(NodeId, Vec2)>,
    dirty: bool,
    disposed: bool,
}

impl DiagramEditor {
    pub fn new(settings: EditorSettings, viewport: Vec2) -> Self {
        let events = EventBus::new();
        let model = GraphModel::with_settings(&settings, events.clone());
        let mut layout = ForceLayout::new(settings.layout.clone(), events.clone());
        layout.set_center(settings.layout.center);
        let scene = SceneRenderer::new(settings.view.clone(), viewport, events.clone());
        Self {
            settings,
            events,
            model,
            layout,
            scene,
            interaction: InteractionState::default(),
            drag_origin: None,
            dirty: true,
            disposed: false,
        }
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    /// Direct model access for host commands. Changes are picked up on the
    /// next frame through the event bus.
    pub fn model_mut(&mut self) -> &mut GraphModel {
        &mut self.model
    }

    pub fn layout(&self) -> &ForceLayout {
        &self.layout
    }

    pub fn scene(&self) -> &SceneRenderer {
        &self.scene
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    pub fn load_json(&mut self, json: &str) -> anyhow::Result<LoadReport> {
        let report = self
            .model
            .load_json(json)
            .context("Failed to load diagram")?;
        self.interaction = InteractionState::default();
        self.drag_origin = None;
        self.dirty = true;
        self.scene.fit_view(&self.model);
        Ok(report)
    }

    pub fn to_json(&self, include_layout: bool) -> anyhow::Result<String> {
        self.model
            .to_json(include_layout)
            .context("Failed to serialize diagram")
    }

    // ------------------------------------------------------------------
    // Frame loop
    // ------------------------------------------------------------------

    pub fn frame(&mut self) -> FrameReport {
        self.frame_at(Instant::now())
    }

    /// Fold pending events, tick the layout once and render if anything changed.
    ///
    /// Model changes are copied into the simulation before it steps, so a tick
    /// never writes stale particle positions over a host move or an undo.
    pub fn frame_at(&mut self, now: Instant) -> FrameReport {
        if self.disposed {
            return FrameReport::default();
        }
        let mut plan = FramePlan::default();
        self.events.dispatch_to(&mut plan);
        if plan.sync_layout {
            self.layout.update(&self.model);
        }
        if plan.restart {
            self.layout.restart_at(now);
        } else if plan.reheat {
            self.layout.reheat_at(now);
        }

        let ticked = self.layout.tick_at(&mut self.model, now);
        // Tick and settle events only need a render.
        self.events.dispatch_to(&mut plan);

        let rendered = (plan.render || self.dirty).then(|| {
            self.dirty = false;
            self.scene.render(&self.model, &self.interaction)
        });
        FrameReport {
            ticked,
            rendered,
            events: plan.events,
        }
    }

    /// Run frames on a simulated 16 ms clock until the layout stops.
    /// Returns the number of frames run.
    pub fn settle(&mut self, start: Instant, max_frames: usize) -> usize {
        let frame = std::time::Duration::from_millis(16);
        let mut now = start;
        let mut frames = 0;
        while frames < max_frames {
            self.frame_at(now);
            frames += 1;
            if !self.layout.is_running() && !self.events.has_pending() {
                break;
            }
            now += frame;
        }
        frames
    }

    // ------------------------------------------------------------------
    // Pointer input
    // ------------------------------------------------------------------

    pub fn pointer_down(&mut self, screen: Vec2, button: PointerButton, modifiers: Modifiers) -> Vec<Intent> {
        let intents = self.scene.pointer_down(screen, button, modifiers);
        self.apply_intents(&intents, Instant::now());
        intents
    }

    pub fn pointer_move(&mut self, screen: Vec2) -> Vec<Intent> {
        let intents = self.scene.pointer_move(screen);
        self.apply_intents(&intents, Instant::now());
        intents
    }

    pub fn pointer_up(&mut self, screen: Vec2) -> Vec<Intent> {
        let intents = self.scene.pointer_up(screen);
        self.apply_intents(&intents, Instant::now());
        intents
    }

    pub fn double_click(&mut self, screen: Vec2) -> Vec<Intent> {
        let intents = self.scene.double_click(screen);
        self.apply_intents(&intents, Instant::now());
        intents
    }

    pub fn pointer_cancel(&mut self) -> Vec<Intent> {
        let intents = self.scene.pointer_cancel();
        self.apply_intents(&intents, Instant::now());
        intents
    }

    pub fn wheel(&mut self, delta_y: f32, anchor: Vec2) {
        self.scene.wheel(delta_y, anchor);
        self.dirty = true;
    }

    fn apply_intents(&mut self, intents: &[Intent], now: Instant) {
        for intent in intents {
            self.handle_intent(intent, now);
        }
    }

    /// Route one intent to the model, the layout or the view.
    pub fn handle_intent(&mut self, intent: &Intent, now: Instant) {
        if self.disposed {
            return;
        }
        tracing::trace!(?intent, "intent");
        match intent {
            Intent::NodeClick { id } => {
                self.interaction.selected_edge = None;
                // A second click on the focused node opens it for editing.
                if self.model.node(id).is_some_and(|n| n.state == NodeState::Active) {
                    self.model.begin_editing(id);
                } else if self.model.activate_node(id).is_some() {
                    self.layout.focus_node(id);
                    self.layout.reheat_at(now);
                }
            }
            Intent::NodeDoubleClick { id } => {
                self.interaction.selected_edge = None;
                self.model.begin_editing(id);
            }
            Intent::NodeDragStart { id, from } => {
                if self.model.node(id).is_some_and(|n| n.state == NodeState::Editable) {
                    return;
                }
                self.drag_origin = Some((id.clone(), *from));
                self.interaction.dragging = Some(id.clone());
                self.layout.start_drag_at(id, now);
            }
            Intent::NodeDrag { id, to } => {
                if self.interaction.dragging.as_ref() == Some(id) {
                    self.layout.drag_to(id, *to);
                    self.model.move_node(id, to.x, to.y, Recording::Silent);
                }
            }
            Intent::NodeDragEnd { id, to } => {
                if let Some((origin_id, from)) = self.drag_origin.take() {
                    if &origin_id == id {
                        self.layout.drag_to(id, *to);
                        self.model.move_node(id, to.x, to.y, Recording::Silent);
                        self.model.commit_move(id, from);
                    }
                }
                self.layout.end_drag_at(id, now);
                self.interaction.dragging = None;
            }
            Intent::NodeDragCancel { id } => {
                if let Some((origin_id, from)) = self.drag_origin.take() {
                    self.model.move_node(&origin_id, from.x, from.y, Recording::Silent);
                }
                self.layout.end_drag_at(id, now);
                self.interaction.dragging = None;
            }
            Intent::EdgeClick { id } | Intent::EdgeDoubleClick { id } => {
                self.select_edge(id);
            }
            Intent::CanvasClick { .. } => {
                self.interaction.selected_edge = None;
                self.model.deactivate_all();
                self.layout.clear_focus();
            }
            Intent::CanvasDoubleClick { at } => {
                self.interaction.selected_edge = None;
                if let Some(node) = self.model.create_node(NewNode::at(at.x, at.y), Recording::Record) {
                    self.model.begin_editing(&node.id);
                }
            }
            Intent::Pan { delta } => self.scene.pan_by(*delta),
            Intent::MarqueeUpdate { rect } => self.interaction.marquee = Some(*rect),
            Intent::MarqueeCancel => self.interaction.marquee = None,
            Intent::MarqueeSelect { rect } => {
                self.interaction.marquee = None;
                self.interaction.selected_edge = None;
                let selected = self.model.select_in_rect(*rect);
                tracing::debug!(count = selected.len(), "marquee selection");
            }
            Intent::ConnectPreview { source, to } => {
                self.interaction.edge_preview = Some((source.clone(), *to));
            }
            Intent::Connect { source, target } => {
                self.interaction.edge_preview = None;
                self.model.create_edge(source, target, None, Recording::Record);
            }
            Intent::ConnectCancel { .. } => self.interaction.edge_preview = None,
        }
        self.dirty = true;
    }

    fn select_edge(&mut self, id: &EdgeId) {
        if self.model.edge(id).is_none() {
            return;
        }
        self.model.deactivate_all();
        self.layout.clear_focus();
        self.interaction.selected_edge = Some(id.clone());
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Commit the text of the node being edited.
    pub fn commit_text(&mut self, id: &NodeId, text: &str) -> bool {
        self.dirty = true;
        self.model.finish_editing(id, text).is_some()
    }

    pub fn cancel_text(&mut self, id: &NodeId) {
        self.dirty = true;
        self.model.cancel_editing(id);
    }

    pub fn set_edge_label(&mut self, id: &EdgeId, label: Option<String>) -> bool {
        self.model
            .update_edge_label(id, label, Recording::Record)
            .is_some()
    }

    /// Delete the selected edge, or else every selected node.
    pub fn delete_selection(&mut self) -> usize {
        self.dirty = true;
        if let Some(edge) = self.interaction.selected_edge.take() {
            return usize::from(self.model.delete_edge(&edge, Recording::Record).is_some());
        }
        self.model.delete_selected()
    }

    pub fn undo(&mut self) -> anyhow::Result<Option<String>> {
        self.interaction.selected_edge = None;
        self.dirty = true;
        self.model.undo().context("Undo failed")
    }

    pub fn redo(&mut self) -> anyhow::Result<Option<String>> {
        self.interaction.selected_edge = None;
        self.dirty = true;
        self.model.redo().context("Redo failed")
    }

    // ------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------

    pub fn fit_view(&mut self) -> bool {
        self.dirty = true;
        self.scene.fit_view(&self.model)
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.scene.resize(width, height);
        self.dirty = true;
    }

    pub fn screen_to_canvas(&self, screen: Vec2) -> Vec2 {
        self.scene.screen_to_canvas(screen)
    }

    /// Stop the simulation and drop the scene. Later frames are no-ops.
    pub fn dispose(&mut self) {
        self.layout.stop();
        self.layout.dispose();
        self.scene.dispose();
        let _ = self.events.drain();
        self.disposed = true;
    }
}
