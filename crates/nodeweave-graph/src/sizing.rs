//! Text wrapping and node box measurement.

use nodeweave_core::{NodeState, Vec2};
use std::fmt;
use std::sync::Arc;
use unicode_width::UnicodeWidthStr;

use crate::settings::SizingConfig;

const ELLIPSIS: &str = "…";

/// Measures rendered text width in canvas pixels.
pub trait TextMeasure: Send + Sync {
    fn width(&self, text: &str) -> f32;
}

/// Monospace approximation: display columns times a fixed column width.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMeasure {
    pub char_width: f32,
}

impl TextMeasure for ColumnMeasure {
    fn width(&self, text: &str) -> f32 {
        text.width() as f32 * self.char_width
    }
}

/// Computes node sizes and the lines a node displays in a given state.
#[derive(Clone)]
pub struct NodeSizer {
    config: SizingConfig,
    measure: Arc<dyn TextMeasure>,
}

impl fmt::Debug for NodeSizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for NodeSizer {
    fn default() -> Self {
        Self::new(SizingConfig::default())
    }
}

impl NodeSizer {
    pub fn new(config: SizingConfig) -> Self {
        let measure = ColumnMeasure {
            char_width: config.char_width,
        };
        Self {
            config,
            measure: Arc::new(measure),
        }
    }

    /// Use host-supplied font metrics instead of the column approximation.
    pub fn with_measure(config: SizingConfig, measure: Arc<dyn TextMeasure>) -> Self {
        Self { config, measure }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    pub fn text_width(&self, text: &str) -> f32 {
        self.measure.width(text)
    }

    fn wrap_width(&self, state: NodeState) -> f32 {
        match state {
            NodeState::Active | NodeState::Editable => self.config.expanded_wrap_width,
            NodeState::Inactive | NodeState::MultiSelected => self.config.collapsed_wrap_width,
        }
    }

    fn max_visible_lines(&self, state: NodeState) -> Option<usize> {
        match state {
            NodeState::Active => None,
            NodeState::Editable => Some(self.config.editing_max_lines),
            NodeState::Inactive | NodeState::MultiSelected => Some(self.config.collapsed_max_lines),
        }
    }

    /// Greedy word wrap. Explicit newlines always break; words wider than
    /// `max_width` are broken between characters.
    pub fn wrap(&self, text: &str, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            let paragraph = paragraph.trim_end_matches('\r');
            if paragraph.trim().is_empty() {
                lines.push(String::new());
                continue;
            }

            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{current} {word}")
                };
                if self.text_width(&candidate) <= max_width {
                    current = candidate;
                    continue;
                }

                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                if self.text_width(word) <= max_width {
                    current = word.to_string();
                } else {
                    let mut pieces = self.break_word(word, max_width);
                    current = pieces.pop().unwrap_or_default();
                    lines.extend(pieces);
                }
            }
            if !current.is_empty() {
                lines.push(current);
            }
        }
        lines
    }

    fn break_word(&self, word: &str, max_width: f32) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut piece = String::new();
        for ch in word.chars() {
            piece.push(ch);
            if self.text_width(&piece) > max_width && piece.chars().count() > 1 {
                piece.pop();
                pieces.push(std::mem::take(&mut piece));
                piece.push(ch);
            }
        }
        if !piece.is_empty() {
            pieces.push(piece);
        }
        pieces
    }

    /// Box size for `text` rendered in `state`.
    pub fn size_for(&self, text: &str, state: NodeState) -> Vec2 {
        let cfg = &self.config;
        if text.trim().is_empty() {
            return Vec2::new(
                cfg.empty_width.max(cfg.min_width),
                cfg.empty_height.max(cfg.min_height),
            );
        }

        let lines = self.wrap(text, self.wrap_width(state));
        let longest = lines
            .iter()
            .map(|line| self.text_width(line))
            .fold(0.0_f32, f32::max);
        let shown = match self.max_visible_lines(state) {
            Some(cap) => lines.len().min(cap),
            None => lines.len(),
        };

        let w = (longest + cfg.padding_x).min(cfg.max_width).max(cfg.min_width);
        let h = (shown as f32 * cfg.line_height + cfg.padding_y).max(cfg.min_height);
        Vec2::new(w, h)
    }

    /// Lines a node shows in `state`. Collapsed nodes end in an ellipsis
    /// when their text does not fit.
    pub fn display_lines(&self, text: &str, state: NodeState) -> Vec<String> {
        let wrap_width = self.wrap_width(state);
        let mut lines = self.wrap(text, wrap_width);
        let collapsed = matches!(state, NodeState::Inactive | NodeState::MultiSelected);
        if collapsed && lines.len() > self.config.collapsed_max_lines {
            lines.truncate(self.config.collapsed_max_lines);
            if let Some(last) = lines.pop() {
                lines.push(self.ellipsize(&last, wrap_width));
            }
        }
        lines
    }

    fn ellipsize(&self, line: &str, max_width: f32) -> String {
        let mut kept = line.to_string();
        loop {
            let candidate = format!("{}{ELLIPSIS}", kept.trim_end());
            if kept.is_empty() || self.text_width(&candidate) <= max_width {
                return candidate;
            }
            kept.pop();
        }
    }

    /// Whether moving from `from` to `to` can change the box size of `text`.
    ///
    /// Leaving EDITABLE always resizes. Otherwise only text that overflows a
    /// collapsed box differs between collapsed and expanded rendering.
    pub fn needs_resize(&self, text: &str, from: NodeState, to: NodeState) -> bool {
        if from == to {
            return false;
        }
        if from == NodeState::Editable {
            return true;
        }
        if !(from.is_focused() || to.is_focused()) {
            return false;
        }
        self.overflows_collapsed(text)
    }

    fn overflows_collapsed(&self, text: &str) -> bool {
        let cap = self
            .config
            .collapsed_max_lines
            .min(self.config.editing_max_lines);
        let mut paragraphs = 0;
        for paragraph in text.split('\n') {
            paragraphs += 1;
            if paragraphs > cap || self.text_width(paragraph) > self.config.collapsed_wrap_width {
                return true;
            }
        }
        false
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = NodeState> {
        prop_oneof![
            Just(NodeState::Inactive),
            Just(NodeState::Active),
            Just(NodeState::Editable),
            Just(NodeState::MultiSelected),
        ]
    }

    proptest! {
        #[test]
        fn prop_size_respects_floor_and_ceiling(text in ".{0,400}", state in any_state()) {
            let sizer = NodeSizer::default();
            let size = sizer.size_for(&text, state);
            prop_assert!(size.x >= 80.0);
            prop_assert!(size.y >= 40.0);
            prop_assert!(size.x <= 300.0);
        }

        #[test]
        fn prop_wrapped_lines_fit(text in "[a-z ]{0,300}", width in 40.0f32..300.0) {
            let sizer = NodeSizer::default();
            for line in sizer.wrap(&text, width) {
                prop_assert!(sizer.text_width(&line) <= width, "{line:?} wider than {width}");
            }
        }

        #[test]
        fn prop_skipped_resize_keeps_size(
            text in "[a-z \n]{0,120}",
            from in any_state(),
            to in any_state(),
        ) {
            let sizer = NodeSizer::default();
            if !sizer.needs_resize(&text, from, to) {
                prop_assert_eq!(sizer.size_for(&text, from), sizer.size_for(&text, to));
            }
        }
    }
}
