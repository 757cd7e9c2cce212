use nodeweave_core::Vec2;
use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_HISTORY_DEPTH;

/// Everything tunable about the editor core, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
    pub sizing: SizingConfig,
    pub layout: LayoutConfig,
    pub view: ViewConfig,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            history_depth: default_history_depth(),
            sizing: SizingConfig::default(),
            layout: LayoutConfig::default(),
            view: ViewConfig::default(),
        }
    }
}

impl EditorSettings {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}

/// Node box measurement constants, in canvas pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    pub min_width: f32,
    pub min_height: f32,
    pub empty_width: f32,
    pub empty_height: f32,
    /// Wrap width for INACTIVE and MULTI_SELECTED nodes.
    pub collapsed_wrap_width: f32,
    /// Wrap width for ACTIVE and EDITABLE nodes.
    pub expanded_wrap_width: f32,
    pub max_width: f32,
    pub line_height: f32,
    pub padding_x: f32,
    pub padding_y: f32,
    /// Width of one terminal column when no real font metrics are supplied.
    pub char_width: f32,
    pub collapsed_max_lines: usize,
    pub editing_max_lines: usize,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            min_width: 80.0,
            min_height: 40.0,
            empty_width: 160.0,
            empty_height: 44.0,
            collapsed_wrap_width: 180.0,
            expanded_wrap_width: 260.0,
            max_width: 300.0,
            line_height: 20.0,
            padding_x: 24.0,
            padding_y: 20.0,
            char_width: 8.0,
            collapsed_max_lines: 3,
            editing_max_lines: 3,
        }
    }
}

/// Force simulation parameters. Distances are canvas pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Negative values repel.
    pub charge_strength: f32,
    pub charge_max_distance: f32,
    pub link_distance: f32,
    pub link_strength: f32,
    pub focus_link_distance: f32,
    pub focus_link_strength: f32,
    pub collision_padding: f32,
    pub collision_strength: f32,
    pub center_strength: f32,
    pub center: Vec2,
    pub initial_alpha: f32,
    pub reheat_alpha: f32,
    pub drag_alpha_target: f32,
    pub alpha_min: f32,
    pub alpha_decay: f32,
    pub velocity_decay: f32,
    pub max_velocity: f32,
    pub settle_time_limit_ms: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            charge_strength: -600.0,
            charge_max_distance: 900.0,
            link_distance: 220.0,
            link_strength: 0.3,
            focus_link_distance: 160.0,
            focus_link_strength: 1.0,
            collision_padding: 12.0,
            collision_strength: 0.8,
            center_strength: 0.02,
            center: Vec2::ZERO,
            initial_alpha: 1.0,
            reheat_alpha: 0.3,
            drag_alpha_target: 0.3,
            alpha_min: 0.001,
            alpha_decay: 0.0228,
            velocity_decay: 0.4,
            max_velocity: 50.0,
            settle_time_limit_ms: 1000,
        }
    }
}

/// Viewport and pointer constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    pub fit_padding: f32,
    /// Screen pixels within which a pointer counts as touching an edge.
    pub edge_hit_tolerance: f32,
    pub edge_anchor_padding: f32,
    /// Perpendicular control-point offset as a fraction of edge length.
    pub curve_factor: f32,
    pub max_curve_offset: f32,
    pub drag_threshold: f32,
    pub zoom_step: f32,
    pub label_badge: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 4.0,
            fit_padding: 50.0,
            edge_hit_tolerance: 15.0,
            edge_anchor_padding: 4.0,
            curve_factor: 0.15,
            max_curve_offset: 40.0,
            drag_threshold: 3.0,
            zoom_step: 1.1,
            label_badge: "…".to_string(),
        }
    }
}
