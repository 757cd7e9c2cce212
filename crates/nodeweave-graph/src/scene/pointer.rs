//! Pointer gesture recognition. Raw pointer input goes in, semantic intents come out.

use nodeweave_core::{EdgeId, NodeId, Rect, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
}

/// What lies under the pointer, resolved by the renderer's hit test.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerTarget {
    Node {
        id: NodeId,
        center: Vec2,
        /// EDITABLE nodes keep pointer input for text editing.
        editing: bool,
    },
    Edge(EdgeId),
    Canvas,
}

/// A user action recognized from pointer input. Positions are canvas
/// coordinates except `Pan`, which is a screen delta.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    NodeClick { id: NodeId },
    NodeDoubleClick { id: NodeId },
    NodeDragStart { id: NodeId, from: Vec2 },
    NodeDrag { id: NodeId, to: Vec2 },
    NodeDragEnd { id: NodeId, to: Vec2 },
    /// The drag was interrupted; the node goes back to where it started.
    NodeDragCancel { id: NodeId },
    EdgeClick { id: EdgeId },
    EdgeDoubleClick { id: EdgeId },
    CanvasClick { at: Vec2 },
    CanvasDoubleClick { at: Vec2 },
    Pan { delta: Vec2 },
    MarqueeUpdate { rect: Rect },
    MarqueeSelect { rect: Rect },
    /// Drop the marquee overlay without touching the selection.
    MarqueeCancel,
    ConnectPreview { source: NodeId, to: Vec2 },
    Connect { source: NodeId, target: NodeId },
    ConnectCancel { source: NodeId },
}

#[derive(Debug, Clone, PartialEq)]
enum Gesture {
    Idle,
    /// Pointer went down on something that does not start a gesture.
    Ignored,
    PressedNode {
        id: NodeId,
        origin: Vec2,
        grab: Vec2,
        center: Vec2,
    },
    DraggingNode {
        id: NodeId,
        grab: Vec2,
    },
    PressedEdge {
        id: EdgeId,
    },
    PressedCanvas {
        origin: Vec2,
        last: Vec2,
        at: Vec2,
    },
    Panning {
        last: Vec2,
    },
    Marquee {
        start: Vec2,
    },
    Connecting {
        source: NodeId,
    },
}

#[derive(Debug, Clone)]
pub struct PointerTracker {
    gesture: Gesture,
    drag_threshold: f32,
}

impl PointerTracker {
    pub fn new(drag_threshold: f32) -> Self {
        Self {
            gesture: Gesture::Idle,
            drag_threshold,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.gesture, Gesture::DraggingNode { .. })
    }

    pub fn pointer_down(
        &mut self,
        target: PointerTarget,
        screen: Vec2,
        canvas: Vec2,
        button: PointerButton,
        modifiers: Modifiers,
    ) -> Vec<Intent> {
        let mut intents = self.cancel();
        self.gesture = match (button, target) {
            (PointerButton::Secondary | PointerButton::Middle, _) => Gesture::Panning { last: screen },
            (PointerButton::Primary, PointerTarget::Node { editing: true, .. }) => Gesture::Ignored,
            (PointerButton::Primary, PointerTarget::Node { id, .. }) if modifiers.alt => {
                intents.push(Intent::ConnectPreview {
                    source: id.clone(),
                    to: canvas,
                });
                Gesture::Connecting { source: id }
            }
            (PointerButton::Primary, PointerTarget::Node { id, center, .. }) => Gesture::PressedNode {
                id,
                origin: screen,
                grab: center - canvas,
                center,
            },
            (PointerButton::Primary, PointerTarget::Edge(id)) => Gesture::PressedEdge { id },
            (PointerButton::Primary, PointerTarget::Canvas) if modifiers.shift => {
                intents.push(Intent::MarqueeUpdate {
                    rect: Rect::from_corners(canvas, canvas),
                });
                Gesture::Marquee { start: canvas }
            }
            (PointerButton::Primary, PointerTarget::Canvas) => Gesture::PressedCanvas {
                origin: screen,
                last: screen,
                at: canvas,
            },
        };
        intents
    }

    pub fn pointer_move(&mut self, screen: Vec2, canvas: Vec2) -> Vec<Intent> {
        let threshold = self.drag_threshold;
        match &mut self.gesture {
            Gesture::PressedNode {
                id,
                origin,
                grab,
                center,
            } => {
                if screen.distance(*origin) < threshold {
                    return Vec::new();
                }
                let (id, grab, from) = (id.clone(), *grab, *center);
                self.gesture = Gesture::DraggingNode {
                    id: id.clone(),
                    grab,
                };
                vec![
                    Intent::NodeDragStart {
                        id: id.clone(),
                        from,
                    },
                    Intent::NodeDrag {
                        id,
                        to: canvas + grab,
                    },
                ]
            }
            Gesture::DraggingNode { id, grab } => vec![Intent::NodeDrag {
                id: id.clone(),
                to: canvas + *grab,
            }],
            Gesture::PressedCanvas { origin, last, .. } => {
                if screen.distance(*origin) < threshold {
                    return Vec::new();
                }
                let delta = screen - *last;
                self.gesture = Gesture::Panning { last: screen };
                vec![Intent::Pan { delta }]
            }
            Gesture::Panning { last } => {
                let delta = screen - *last;
                *last = screen;
                vec![Intent::Pan { delta }]
            }
            Gesture::Marquee { start } => vec![Intent::MarqueeUpdate {
                rect: Rect::from_corners(*start, canvas),
            }],
            Gesture::Connecting { source } => vec![Intent::ConnectPreview {
                source: source.clone(),
                to: canvas,
            }],
            Gesture::Idle | Gesture::Ignored | Gesture::PressedEdge { .. } => Vec::new(),
        }
    }

    pub fn pointer_up(&mut self, target: PointerTarget, canvas: Vec2) -> Vec<Intent> {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::PressedNode { id, .. } => vec![Intent::NodeClick { id }],
            Gesture::DraggingNode { id, grab } => vec![Intent::NodeDragEnd {
                id,
                to: canvas + grab,
            }],
            Gesture::PressedEdge { id } => vec![Intent::EdgeClick { id }],
            Gesture::PressedCanvas { at, .. } => vec![Intent::CanvasClick { at }],
            Gesture::Marquee { start } => vec![Intent::MarqueeSelect {
                rect: Rect::from_corners(start, canvas),
            }],
            Gesture::Connecting { source } => match target {
                PointerTarget::Node { id, .. } if id != source => vec![Intent::Connect {
                    source,
                    target: id,
                }],
                _ => vec![Intent::ConnectCancel { source }],
            },
            Gesture::Panning { .. } | Gesture::Ignored | Gesture::Idle => Vec::new(),
        }
    }

    pub fn double_click(&mut self, target: PointerTarget, canvas: Vec2) -> Vec<Intent> {
        let mut intents = self.cancel();
        match target {
            PointerTarget::Node { editing: true, .. } => {}
            PointerTarget::Node { id, .. } => intents.push(Intent::NodeDoubleClick { id }),
            PointerTarget::Edge(id) => intents.push(Intent::EdgeDoubleClick { id }),
            PointerTarget::Canvas => intents.push(Intent::CanvasDoubleClick { at: canvas }),
        }
        intents
    }

    /// Abort the current gesture, e.g. when the pointer leaves the canvas.
    pub fn cancel(&mut self) -> Vec<Intent> {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::DraggingNode { id, .. } => {
                tracing::debug!(%id, "drag cancelled");
                vec![Intent::NodeDragCancel { id }]
            }
            Gesture::Marquee { .. } => vec![Intent::MarqueeCancel],
            Gesture::Connecting { source } => vec![Intent::ConnectCancel { source }],
            _ => Vec::new(),
        }
    }
}
