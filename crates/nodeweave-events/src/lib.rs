use crossbeam_channel::{Receiver, Sender, unbounded};
use nodeweave_core::{EdgeId, NodeId, NodeState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // ========================================================================
    // Graph Model Events
    // ========================================================================
    NodeCreated {
        id: NodeId,
    },
    NodeDeleted {
        id: NodeId,
        removed_edges: usize,
    },
    NodeMoved {
        id: NodeId,
        x: f32,
        y: f32,
    },
    NodeTextChanged {
        id: NodeId,
    },
    NodeStateChanged {
        id: NodeId,
        state: NodeState,
    },
    NodeResized {
        id: NodeId,
        w: f32,
        h: f32,
    },
    EdgeCreated {
        id: EdgeId,
    },
    EdgeDeleted {
        id: EdgeId,
    },
    EdgeLabelChanged {
        id: EdgeId,
    },
    GraphCleared,
    GraphLoaded {
        node_count: usize,
        edge_count: usize,
    },

    // ========================================================================
    // Layout Events
    // ========================================================================
    /// One simulation step ran and positions were written back to the model.
    LayoutTick {
        alpha: f32,
    },
    /// The simulation stopped, either converged or cut off by the settle timer.
    LayoutSettled {
        timed_out: bool,
    },

    // ========================================================================
    // View Events
    // ========================================================================
    ViewChanged {
        x: f32,
        y: f32,
        scale: f32,
    },

    // ========================================================================
    // Undo/Redo Events
    // ========================================================================
    UndoStackChanged {
        can_undo: bool,
        can_redo: bool,
        undo_description: Option<String>,
        redo_description: Option<String>,
    },
    /// An undo/redo could not be applied; the entry was discarded.
    ReplayFailed {
        description: String,
        reason: String,
    },
}

impl Event {
    /// Whether the event changes anything the scene renderer draws.
    pub fn affects_scene(&self) -> bool {
        !matches!(
            self,
            Event::UndoStackChanged { .. } | Event::ReplayFailed { .. }
        )
    }

    /// Node or edge set changes, and size changes that alter collision radii.
    /// The layout has to rebuild its particles and springs after these.
    pub fn changes_structure(&self) -> bool {
        matches!(
            self,
            Event::NodeCreated { .. }
                | Event::NodeDeleted { .. }
                | Event::NodeResized { .. }
                | Event::EdgeCreated { .. }
                | Event::EdgeDeleted { .. }
                | Event::GraphCleared
                | Event::GraphLoaded { .. }
        )
    }
}

/// FIFO queue connecting the model, the layout and the scene.
///
/// Clones share one queue: anything published through a clone is drained by
/// every other handle. Nothing is delivered until the owner dispatches, so
/// mutations never trigger work synchronously.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn publish(&self, event: Event) {
        tracing::trace!(?event, "publish");
        // The bus holds its own receiver, so the channel never disconnects.
        let _ = self.tx.send(event);
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Take every pending event without dispatching it.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }

    /// Deliver pending events in publish order. Events the listener causes to
    /// be published are delivered in the same pass.
    pub fn dispatch_to<L: EventListener + ?Sized>(&self, listener: &mut L) -> usize {
        let mut count = 0;
        while let Ok(event) = self.rx.try_recv() {
            listener.handle_event(&event);
            count += 1;
        }
        if count > 0 {
            tracing::trace!(count, "dispatched events");
        }
        count
    }
}

pub trait EventListener {
    fn handle_event(&mut self, event: &Event);
}

impl<F> EventListener for F
where
    F: FnMut(&Event),
{
    fn handle_event(&mut self, event: &Event) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<Event>,
    }

    impl EventListener for Recorder {
        fn handle_event(&mut self, event: &Event) {
            self.seen.push(event.clone());
        }
    }

    #[test]
    fn test_closure_listener_sees_events_in_order() {
        let bus = EventBus::new();
        bus.publish(Event::NodeCreated {
            id: NodeId::from("n1"),
        });
        bus.publish(Event::NodeMoved {
            id: NodeId::from("n1"),
            x: 4.0,
            y: 2.0,
        });
        assert_eq!(bus.pending(), 2);

        let mut ids = Vec::new();
        let mut collect = |event: &Event| {
            if let Event::NodeCreated { id } | Event::NodeMoved { id, .. } = event {
                ids.push(id.clone());
            }
        };
        assert_eq!(bus.dispatch_to(&mut collect), 2);
        assert_eq!(ids, vec![NodeId::from("n1"), NodeId::from("n1")]);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn test_structural_events() {
        assert!(Event::GraphCleared.changes_structure());
        assert!(Event::EdgeDeleted { id: EdgeId::from("e") }.changes_structure());
        assert!(!Event::NodeMoved {
            id: NodeId::from("n"),
            x: 0.0,
            y: 0.0
        }
        .changes_structure());
        assert!(!Event::LayoutTick { alpha: 0.1 }.changes_structure());
    }

    #[test]
    fn test_dispatch_drains_in_order() {
        let bus = EventBus::new();
        bus.publish(Event::GraphCleared);
        bus.publish(Event::LayoutTick { alpha: 0.5 });
        bus.publish(Event::LayoutSettled { timed_out: false });
        assert!(bus.has_pending());

        let mut recorder = Recorder::default();
        assert_eq!(bus.dispatch_to(&mut recorder), 3);
        assert!(!bus.has_pending());
        assert_eq!(recorder.seen[0], Event::GraphCleared);
        assert_eq!(recorder.seen[2], Event::LayoutSettled { timed_out: false });
    }

    #[test]
    fn test_clones_share_one_queue() {
        let bus = EventBus::new();
        let other = bus.clone();
        other.publish(Event::EdgeDeleted {
            id: EdgeId::from("e1"),
        });
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(other.drain().is_empty());
    }

    #[test]
    fn test_history_events_do_not_affect_scene() {
        let event = Event::UndoStackChanged {
            can_undo: true,
            can_redo: false,
            undo_description: Some("Create node".to_string()),
            redo_description: None,
        };
        assert!(!event.affects_scene());
        assert!(Event::GraphCleared.affects_scene());
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("UndoStackChanged"));
    }
}
