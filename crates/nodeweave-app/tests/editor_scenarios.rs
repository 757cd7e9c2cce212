use nodeweave_app::{DiagramEditor, EditorSettings, Intent, Modifiers, PointerButton};
use nodeweave_core::{NodeId, NodeState, Rect, Vec2};
use nodeweave_graph::{LabelDisplay, NewNode, Recording};
use std::time::{Duration, Instant};

const STAR: &str = r#"{
  "title": "star",
  "nodes": [
    {"id": "hub", "text": "Hub", "x": 0, "y": 0},
    {"id": "left", "text": "Left leaf", "x": -700, "y": 200},
    {"id": "right", "text": "Right leaf", "x": 900, "y": -300}
  ],
  "edges": [
    {"id": "e1", "sourceId": "hub", "targetId": "left", "label": "owns"},
    {"id": "e2", "sourceId": "hub", "targetId": "right"}
  ]
}"#;

fn editor() -> DiagramEditor {
    DiagramEditor::new(EditorSettings::default(), Vec2::new(800.0, 600.0))
}

fn add(editor: &mut DiagramEditor, id: &str, x: f32, y: f32) -> NodeId {
    editor
        .model_mut()
        .create_node(NewNode::at(x, y).with_id(id).with_text(id), Recording::Record)
        .expect("node created")
        .id
}

#[test]
fn test_load_fits_and_renders_star() -> anyhow::Result<()> {
    let mut editor = editor();
    let report = editor.load_json(STAR)?;
    assert_eq!(report.nodes_loaded, 3);
    assert_eq!(report.edges_loaded, 2);
    assert!(!editor.model().can_undo());

    let frame = editor.frame();
    let stats = frame.rendered.expect("first frame renders");
    assert_eq!(stats.created, 5);
    assert!(editor.layout().is_running());

    let view = editor.scene().view();
    assert!(view.scale <= 1.0);
    let padding = editor.settings().view.fit_padding;
    let inner = Rect::from_min_max(Vec2::new(padding, padding), Vec2::new(800.0 - padding, 600.0 - padding))
        .expand(0.01);
    for node in editor.model().nodes() {
        let on_screen = view.canvas_rect_to_screen(&node.rect());
        assert!(inner.contains_rect(&on_screen), "{} outside viewport", node.id);
    }
    Ok(())
}

#[test]
fn test_layout_settles_within_time_limit() -> anyhow::Result<()> {
    let mut editor = editor();
    editor.load_json(STAR)?;
    let start = Instant::now();
    let frames = editor.settle(start, 10_000);
    assert!(!editor.layout().is_running());
    let limit = editor.settings().layout.settle_time_limit_ms as usize;
    assert!(frames <= limit / 16 + 3, "took {frames} frames");
    for node in editor.model().nodes() {
        assert!(node.center().is_finite());
    }
    Ok(())
}

#[test]
fn test_frames_render_only_when_something_changed() {
    let mut editor = editor();
    assert!(editor.frame().rendered.is_some());
    assert!(editor.frame().rendered.is_none());

    for (i, id) in ["a", "b", "c"].iter().enumerate() {
        add(&mut editor, id, i as f32 * 200.0, 0.0);
    }
    let frame = editor.frame();
    assert_eq!(frame.rendered.map(|s| s.created), Some(3));
    assert!(frame.events.len() >= 3);
}

#[test]
fn test_double_click_creates_node_in_edit_mode() {
    let mut editor = editor();
    editor.frame();
    let intents = editor.double_click(Vec2::new(400.0, 300.0));
    assert!(matches!(intents[..], [Intent::CanvasDoubleClick { .. }]));

    let node = editor.model().active_node().cloned().expect("new node focused");
    assert_eq!(node.state, NodeState::Editable);
    assert_eq!(node.center(), Vec2::new(400.0, 300.0));

    assert!(editor.commit_text(&node.id, "hello"));
    let committed = editor.model().node(&node.id).expect("node kept");
    assert_eq!(committed.text, "hello");
    assert_eq!(committed.state, NodeState::Active);

    editor.undo().expect("undo text");
    assert_eq!(editor.model().node(&node.id).map(|n| n.text.as_str()), Some(""));
    editor.undo().expect("undo create");
    assert!(editor.model().node(&node.id).is_none());
}

#[test]
fn test_abandoned_empty_node_leaves_no_trace() {
    let mut editor = editor();
    editor.frame();
    editor.double_click(Vec2::new(400.0, 300.0));
    assert_eq!(editor.model().node_count(), 1);

    editor.frame();
    editor.pointer_down(Vec2::new(50.0, 50.0), PointerButton::Primary, Modifiers::default());
    let intents = editor.pointer_up(Vec2::new(50.0, 50.0));
    assert!(matches!(intents[..], [Intent::CanvasClick { .. }]));
    assert_eq!(editor.model().node_count(), 0);
    assert!(!editor.model().can_undo());
}

#[test]
fn test_drag_records_a_single_move() -> anyhow::Result<()> {
    let mut editor = editor();
    let id = add(&mut editor, "a", 0.0, 0.0);
    editor.frame();

    editor.pointer_down(Vec2::ZERO, PointerButton::Primary, Modifiers::default());
    let intents = editor.pointer_move(Vec2::new(50.0, 0.0));
    assert!(matches!(intents[0], Intent::NodeDragStart { .. }));
    assert!(editor.interaction().dragging.is_some());
    editor.pointer_move(Vec2::new(55.0, 0.0));
    editor.pointer_up(Vec2::new(60.0, 0.0));

    assert_eq!(editor.model().node(&id).map(|n| n.center()), Some(Vec2::new(60.0, 0.0)));
    assert!(editor.interaction().dragging.is_none());
    assert_eq!(editor.model().history().undo_len(), 2);

    editor.undo()?;
    assert_eq!(editor.model().node(&id).map(|n| n.center()), Some(Vec2::ZERO));
    Ok(())
}

#[test]
fn test_editable_node_cannot_be_dragged() {
    let mut editor = editor();
    let id = add(&mut editor, "a", 0.0, 0.0);
    editor.model_mut().begin_editing(&id);
    editor.frame();

    editor.pointer_down(Vec2::ZERO, PointerButton::Primary, Modifiers::default());
    assert!(editor.pointer_move(Vec2::new(80.0, 0.0)).is_empty());
    editor.pointer_up(Vec2::new(80.0, 0.0));
    assert_eq!(editor.model().node(&id).map(|n| n.center()), Some(Vec2::ZERO));
}

#[test]
fn test_alt_drag_connects_and_previews() {
    let mut editor = editor();
    let a = add(&mut editor, "a", 0.0, 0.0);
    let b = add(&mut editor, "b", 300.0, 0.0);
    editor.frame();

    let alt = Modifiers {
        alt: true,
        ..Modifiers::default()
    };
    editor.pointer_down(Vec2::ZERO, PointerButton::Primary, alt);
    editor.pointer_move(Vec2::new(150.0, 10.0));
    editor.frame();
    assert!(editor.scene().preview().is_some());

    editor.pointer_up(Vec2::new(300.0, 0.0));
    assert!(editor.model().edge_between(&a, &b).is_some());
    editor.frame();
    assert!(editor.scene().preview().is_none());
    assert_eq!(editor.scene().edge_elements().count(), 1);
}

#[test]
fn test_shift_drag_multi_selects_and_deletes_in_one_step() {
    let mut editor = editor();
    add(&mut editor, "a", 0.0, 0.0);
    add(&mut editor, "b", 300.0, 0.0);
    add(&mut editor, "c", 0.0, 400.0);
    editor.frame();

    let shift = Modifiers {
        shift: true,
        ..Modifiers::default()
    };
    editor.pointer_down(Vec2::new(-100.0, -60.0), PointerButton::Primary, shift);
    editor.pointer_move(Vec2::new(200.0, 30.0));
    assert!(editor.interaction().marquee.is_some());
    editor.pointer_up(Vec2::new(400.0, 60.0));
    assert!(editor.interaction().marquee.is_none());

    let selected: Vec<&str> = editor.model().selected_nodes().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(selected, vec!["a", "b"]);

    assert_eq!(editor.delete_selection(), 2);
    assert_eq!(editor.model().node_count(), 1);
    editor.undo().expect("undo batch");
    assert_eq!(editor.model().node_count(), 3);
}

#[test]
fn test_node_click_focuses_layout_and_labels() -> anyhow::Result<()> {
    let mut editor = editor();
    editor.load_json(STAR)?;
    editor.frame();

    let hub = NodeId::from("hub");
    editor.handle_intent(&Intent::NodeClick { id: hub.clone() }, Instant::now());
    let config = editor.settings().layout.clone();
    let spring = editor.layout().spring(&"e1".into()).expect("spring");
    assert_eq!(spring.strength, config.focus_link_strength);
    assert_eq!(spring.distance, config.focus_link_distance);

    editor.frame();
    let label = &editor.scene().edge_element(&"e1".into()).expect("edge rendered").label;
    assert!(matches!(label, LabelDisplay::Full { text, .. } if text == "owns"));

    editor.handle_intent(&Intent::CanvasClick { at: Vec2::ZERO }, Instant::now());
    let spring = editor.layout().spring(&"e1".into()).expect("spring");
    assert_eq!(spring.strength, config.link_strength);
    editor.frame();
    let label = &editor.scene().edge_element(&"e1".into()).expect("edge rendered").label;
    assert!(matches!(label, LabelDisplay::Badge { .. }));
    Ok(())
}

#[test]
fn test_edge_selection_and_delete() -> anyhow::Result<()> {
    let mut editor = editor();
    editor.load_json(STAR)?;
    editor.frame();

    editor.handle_intent(&Intent::EdgeClick { id: "e2".into() }, Instant::now());
    assert_eq!(editor.interaction().selected_edge, Some("e2".into()));
    assert_eq!(editor.delete_selection(), 1);
    assert_eq!(editor.model().edge_count(), 1);

    editor.undo()?;
    assert_eq!(editor.model().edge_count(), 2);
    assert!(editor.set_edge_label(&"e2".into(), Some("calls".into())));
    assert_eq!(
        editor.model().edge(&"e2".into()).and_then(|e| e.label.as_deref()),
        Some("calls")
    );
    Ok(())
}

#[test]
fn test_json_round_trip_with_layout() -> anyhow::Result<()> {
    let mut editor = editor();
    editor.load_json(STAR)?;
    let json = editor.to_json(true)?;

    let mut reloaded = self::editor();
    reloaded.load_json(&json)?;
    for node in editor.model().nodes() {
        let copy = reloaded.model().node(&node.id).expect("node survives");
        assert_eq!(copy.text, node.text);
        assert_eq!(copy.center(), node.center());
    }

    let bare: serde_json::Value = serde_json::from_str(&editor.to_json(false)?)?;
    assert!(bare["nodes"][0].get("x").is_none());
    assert_eq!(bare["edges"][0]["label"], "owns");
    Ok(())
}

#[test]
fn test_invalid_json_is_reported() {
    let mut editor = editor();
    let err = editor.load_json("{ nope").expect_err("bad JSON");
    assert!(format!("{err:#}").contains("invalid document JSON"));
}

#[test]
fn test_wheel_zoom_and_dispose() {
    let mut editor = editor();
    editor.frame();
    editor.wheel(-1.0, Vec2::new(400.0, 300.0));
    assert!(editor.scene().view().scale > 1.0);
    let fixed = editor.screen_to_canvas(Vec2::new(400.0, 300.0));
    assert!(fixed.distance(Vec2::new(400.0, 300.0)) < 1e-3);

    editor.dispose();
    let frame = editor.frame_at(Instant::now() + Duration::from_millis(16));
    assert!(frame.rendered.is_none());
    assert!(!frame.ticked);
}

#[test]
fn test_host_move_and_undo_survive_a_running_layout() -> anyhow::Result<()> {
    let mut editor = editor();
    let a = add(&mut editor, "a", 0.0, 0.0);
    add(&mut editor, "b", 300.0, 0.0);
    let t0 = Instant::now();
    editor.frame_at(t0);
    assert!(editor.layout().is_running());

    let before = editor.model().node(&a).map(|n| n.center()).expect("a exists");
    let target = Vec2::new(2000.0, 2000.0);
    editor.model_mut().move_node(&a, target.x, target.y, Recording::Record);
    editor.frame_at(t0 + Duration::from_millis(16));
    assert!(editor.layout().is_running());
    let moved = editor.model().node(&a).map(|n| n.center()).expect("a exists");
    assert!(moved.distance(target) < 100.0, "host move lost: {moved:?}");

    editor.undo()?;
    editor.frame_at(t0 + Duration::from_millis(32));
    let restored = editor.model().node(&a).map(|n| n.center()).expect("a exists");
    assert!(restored.distance(before) < 100.0, "undo lost: {restored:?}");
    Ok(())
}

#[test]
fn test_second_click_on_active_node_starts_editing() {
    let mut editor = editor();
    let a = add(&mut editor, "a", 0.0, 0.0);
    editor.frame();

    editor.handle_intent(&Intent::NodeClick { id: a.clone() }, Instant::now());
    assert_eq!(editor.model().node(&a).map(|n| n.state), Some(NodeState::Active));
    editor.handle_intent(&Intent::NodeClick { id: a.clone() }, Instant::now());
    assert_eq!(editor.model().node(&a).map(|n| n.state), Some(NodeState::Editable));
}

#[test]
fn test_second_press_interrupts_drag() {
    let mut editor = editor();
    let a = add(&mut editor, "a", 0.0, 0.0);
    editor.frame();

    editor.pointer_down(Vec2::ZERO, PointerButton::Primary, Modifiers::default());
    editor.pointer_move(Vec2::new(50.0, 0.0));
    assert_eq!(editor.interaction().dragging.as_ref(), Some(&a));

    let intents = editor.pointer_down(Vec2::new(500.0, 500.0), PointerButton::Secondary, Modifiers::default());
    assert!(matches!(&intents[..], [Intent::NodeDragCancel { id }] if *id == a));
    editor.pointer_up(Vec2::new(500.0, 500.0));

    assert!(editor.interaction().dragging.is_none());
    assert!(editor.layout().particle(&a).is_some_and(|p| p.pinned.is_none()));
    assert_eq!(editor.model().node(&a).map(|n| n.center()), Some(Vec2::ZERO));
    assert_eq!(editor.model().history().undo_len(), 1);

    // A fresh drag works normally afterwards.
    editor.pointer_down(Vec2::ZERO, PointerButton::Primary, Modifiers::default());
    editor.pointer_move(Vec2::new(40.0, 0.0));
    editor.pointer_up(Vec2::new(40.0, 0.0));
    assert_eq!(editor.model().node(&a).map(|n| n.center()), Some(Vec2::new(40.0, 0.0)));
}

#[test]
fn test_cancelled_marquee_keeps_selection() {
    let mut editor = editor();
    let a = add(&mut editor, "a", 0.0, 0.0);
    editor.frame();
    editor.handle_intent(&Intent::NodeClick { id: a.clone() }, Instant::now());

    let shift = Modifiers {
        shift: true,
        ..Modifiers::default()
    };
    editor.pointer_down(Vec2::new(200.0, 200.0), PointerButton::Primary, shift);
    editor.pointer_move(Vec2::new(300.0, 300.0));
    assert!(editor.interaction().marquee.is_some());

    let intents = editor.pointer_cancel();
    assert_eq!(intents, vec![Intent::MarqueeCancel]);
    assert!(editor.interaction().marquee.is_none());
    assert_eq!(editor.model().node(&a).map(|n| n.state), Some(NodeState::Active));
}

#[test]
fn test_focus_change_through_node_state_discards_blank_node() {
    let mut editor = editor();
    let a = add(&mut editor, "a", 0.0, 0.0);
    editor.frame();
    editor.double_click(Vec2::new(400.0, 300.0));
    assert_eq!(editor.model().node_count(), 2);

    editor.model_mut().set_node_state(&a, NodeState::Active);
    assert_eq!(editor.model().node_count(), 1);
    assert_eq!(editor.model().active_node().map(|n| &n.id), Some(&a));
    assert_eq!(editor.model().history().undo_len(), 1);

    editor.frame();
    assert_eq!(editor.scene().node_elements().count(), 1);
}
