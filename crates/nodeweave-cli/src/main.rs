use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nodeweave_app::{DiagramEditor, EditorSettings};
use nodeweave_core::Vec2;
use nodeweave_graph::LabelDisplay;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Frames are capped so a pathological settings file cannot spin forever.
const MAX_FRAMES: usize = 100_000;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Diagram JSON file ({title?, nodes, edges})
    input: PathBuf,

    /// Editor settings JSON; missing fields fall back to defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print node and edge counts and the diagram bounds
    Stats,
    /// Settle the force layout and write the diagram with positions
    Layout {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the settle time limit in milliseconds
        #[arg(long)]
        settle_ms: Option<u64>,
    },
    /// Fit the view, render once and print the scene elements
    Scene {
        #[arg(long, default_value_t = 1280.0)]
        width: f32,

        #[arg(long, default_value_t = 800.0)]
        height: f32,

        /// Settle the layout before rendering
        #[arg(long)]
        settle: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<EditorSettings> {
    let Some(path) = path else {
        return Ok(EditorSettings::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings {}", path.display()))?;
    EditorSettings::from_json_str(&json).with_context(|| format!("Invalid settings {}", path.display()))
}

fn open_editor(args: &Args, settings: EditorSettings, viewport: Vec2) -> Result<DiagramEditor> {
    let json = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read diagram {}", args.input.display()))?;
    let mut editor = DiagramEditor::new(settings, viewport);
    let report = editor.load_json(&json)?;
    info!(
        nodes = report.nodes_loaded,
        edges = report.edges_loaded,
        rejected_nodes = report.nodes_rejected,
        rejected_edges = report.edges_rejected,
        path = %args.input.display(),
        "Loaded diagram"
    );
    Ok(editor)
}

fn settle(editor: &mut DiagramEditor) {
    let started = Instant::now();
    let frames = editor.settle(Instant::now(), MAX_FRAMES);
    info!(
        frames,
        alpha = editor.layout().alpha(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Layout settled"
    );
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut settings = load_settings(args.config.as_deref())?;

    match &args.command {
        Command::Stats => {
            let editor = open_editor(&args, settings, Vec2::new(1280.0, 800.0))?;
            let model = editor.model();
            if let Some(title) = model.title() {
                println!("title: {title}");
            }
            println!("nodes: {}", model.node_count());
            println!("edges: {}", model.edge_count());
            let labelled = model.edges().filter(|e| e.has_label()).count();
            println!("labelled edges: {labelled}");
            if let Some(bounds) = model.bounding_box() {
                println!(
                    "bounds: ({:.1}, {:.1}) .. ({:.1}, {:.1})",
                    bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y
                );
            }
            let isolated = model
                .nodes()
                .filter(|n| model.connected_edges(&n.id).is_empty())
                .count();
            println!("isolated nodes: {isolated}");
        }
        Command::Layout { output, settle_ms } => {
            if let Some(ms) = settle_ms {
                settings.layout.settle_time_limit_ms = *ms;
            }
            let mut editor = open_editor(&args, settings, Vec2::new(1280.0, 800.0))?;
            settle(&mut editor);
            let json = editor.to_json(true)?;
            match output {
                Some(path) => {
                    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), "Wrote diagram");
                }
                None => println!("{json}"),
            }
        }
        Command::Scene { width, height, settle: run_layout } => {
            let mut editor = open_editor(&args, settings, Vec2::new(*width, *height))?;
            if *run_layout {
                settle(&mut editor);
            }
            editor.fit_view();
            let stats = editor.frame().rendered.unwrap_or_default();
            let view = editor.scene().view();
            println!(
                "view: x={:.1} y={:.1} scale={:.3} (created {}, updated {}, skipped edges {})",
                view.x, view.y, view.scale, stats.created, stats.updated, stats.skipped_edges
            );
            for node in editor.scene().node_elements() {
                let rect = view.canvas_rect_to_screen(&node.rect);
                println!(
                    "node #{} {} [{}] at ({:.0}, {:.0}) {:.0}x{:.0}: {}",
                    node.key,
                    node.id,
                    node.state,
                    rect.min.x,
                    rect.min.y,
                    rect.width(),
                    rect.height(),
                    node.lines.join(" / ")
                );
            }
            for edge in editor.scene().edge_elements() {
                let label = match &edge.label {
                    LabelDisplay::Hidden => String::new(),
                    LabelDisplay::Badge { text, .. } => format!(" {text}"),
                    LabelDisplay::Full { text, .. } => format!(" \"{text}\""),
                };
                println!(
                    "edge #{} {} {} -> {}{}",
                    edge.key, edge.id, edge.source_id, edge.target_id, label
                );
            }
        }
    }

    Ok(())
}
