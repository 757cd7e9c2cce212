pub mod document;
pub mod edge_router;
pub mod geometry;
pub mod history;
pub mod hit_tester;
pub mod layout;
pub mod model;
pub mod scene;
pub mod settings;
pub mod sizing;
pub mod store;

pub use document::{DocumentData, DocumentError, EdgeRecord, LoadReport, NodeRecord};
pub use edge_router::{EdgePath, EdgeRouter};
pub use history::{CommandLog, DEFAULT_HISTORY_DEPTH, Direction, HistoryError, ReplayTarget, UndoAction};
pub use hit_tester::{HitResult, HitTester};
pub use layout::{ForceLayout, Particle, SpringInfo};
pub use model::{GraphModel, NewEdge, NewNode, Recording};
pub use scene::{
    EdgeElement, EdgePreview, InteractionState, Intent, LabelDisplay, Modifiers, NodeElement,
    PointerButton, RenderStats, SceneRenderer, ViewTransform,
};
pub use settings::{EditorSettings, LayoutConfig, SizingConfig, ViewConfig};
pub use sizing::{ColumnMeasure, NodeSizer, TextMeasure};
pub use store::{EdgeRejection, GraphStore};
