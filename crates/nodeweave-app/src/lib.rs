mod editor;
mod shared;

pub use editor::{DiagramEditor, FrameReport};
pub use shared::SharedEditor;

pub use nodeweave_graph::{EditorSettings, Intent, Modifiers, PointerButton};
