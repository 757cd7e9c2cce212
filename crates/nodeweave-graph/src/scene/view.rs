use nodeweave_core::{Rect, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 4.0;

/// Canvas-to-screen mapping: `screen = canvas * scale + (x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

impl ViewTransform {
    pub fn new(x: f32, y: f32, scale: f32) -> Self {
        Self {
            x,
            y,
            scale: scale.clamp(MIN_SCALE, MAX_SCALE),
        }
    }

    pub fn translation(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn screen_to_canvas(&self, screen: Vec2) -> Vec2 {
        (screen - self.translation()) / self.scale
    }

    pub fn canvas_to_screen(&self, canvas: Vec2) -> Vec2 {
        canvas * self.scale + self.translation()
    }

    pub fn canvas_rect_to_screen(&self, rect: &Rect) -> Rect {
        Rect::from_min_max(self.canvas_to_screen(rect.min), self.canvas_to_screen(rect.max))
    }

    pub fn screen_rect_to_canvas(&self, rect: &Rect) -> Rect {
        Rect::from_min_max(self.screen_to_canvas(rect.min), self.screen_to_canvas(rect.max))
    }

    pub fn pan_by(&mut self, screen_delta: Vec2) {
        if screen_delta.is_finite() {
            self.x += screen_delta.x;
            self.y += screen_delta.y;
        }
    }

    /// Set the zoom level (clamped to `min..=max`)
    pub fn set_scale(&mut self, scale: f32, min: f32, max: f32) {
        if scale.is_finite() {
            self.scale = scale.clamp(min, max);
        }
    }

    /// Zoom by `factor` keeping the canvas point under `anchor` (screen) fixed.
    pub fn zoom_at(&mut self, factor: f32, anchor: Vec2, min: f32, max: f32) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let pinned = self.screen_to_canvas(anchor);
        self.set_scale(self.scale * factor, min, max);
        let moved = self.canvas_to_screen(pinned);
        self.x += anchor.x - moved.x;
        self.y += anchor.y - moved.y;
    }
}
