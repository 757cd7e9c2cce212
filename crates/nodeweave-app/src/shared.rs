use nodeweave_core::Vec2;
use nodeweave_graph::EditorSettings;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::editor::{DiagramEditor, FrameReport};

/// Cloneable handle for hosts that drive input and the frame clock from
/// different places (e.g. an input callback and an animation timer).
///
/// Every call takes the lock for its whole duration, so input handling and
/// frames never interleave.
#[derive(Clone)]
pub struct SharedEditor {
    inner: Arc<Mutex<DiagramEditor>>,
}

impl SharedEditor {
    pub fn new(settings: EditorSettings, viewport: Vec2) -> Self {
        Self::from_editor(DiagramEditor::new(settings, viewport))
    }

    pub fn from_editor(editor: DiagramEditor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(editor)),
        }
    }

    /// Run `f` with exclusive access to the editor.
    pub fn with<R>(&self, f: impl FnOnce(&mut DiagramEditor) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn frame(&self) -> FrameReport {
        self.inner.lock().frame()
    }

    pub fn dispose(&self) {
        self.inner.lock().dispose();
    }
}
