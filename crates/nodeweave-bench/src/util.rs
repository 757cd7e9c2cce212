use nodeweave_events::EventBus;
use nodeweave_graph::{GraphModel, NewNode, Recording};

/// A deterministic diagram: `node_count` nodes on a grid, each linked to the
/// next one and to a hub every `fan_out` nodes.
pub fn synthetic_diagram(node_count: usize, fan_out: usize) -> GraphModel {
    let mut model = GraphModel::new(EventBus::new());
    let columns = (node_count as f32).sqrt().ceil().max(1.0) as usize;
    let ids: Vec<_> = (0..node_count)
        .filter_map(|i| {
            let x = (i % columns) as f32 * 180.0;
            let y = (i / columns) as f32 * 90.0;
            model
                .create_node(
                    NewNode::at(x, y).with_text(format!("Node {i}")),
                    Recording::Silent,
                )
                .map(|node| node.id)
        })
        .collect();

    for pair in ids.windows(2) {
        model.create_edge(&pair[0], &pair[1], None, Recording::Silent);
    }
    let fan_out = fan_out.max(1);
    for (i, id) in ids.iter().enumerate().skip(1) {
        if i % fan_out == 0 {
            model.create_edge(&ids[0], id, Some(format!("link {i}")), Recording::Silent);
        }
    }
    // Events from construction are not part of what gets measured.
    let _ = model.events().drain();
    model
}
