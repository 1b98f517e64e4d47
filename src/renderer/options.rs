//! Render configuration.
//!
//! Every record deserializes with per-field defaults, so a host can pass a
//! partial JSON object such as `{"layout": {"notes_per_column": 8}}`.

use serde::{Deserialize, Serialize};

use super::constants::*;
use super::modifiers::{Anchor, Offset, Placement};

/// Spacing used by the column layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub top_margin: f64,
    pub note_spacing: f64,
    pub extra_spacing: f64,
    pub column_width: f64,
    pub column_spacing: f64,
    /// Fixed column capacity; derived from the viewport height when `None`.
    pub notes_per_column: Option<usize>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            top_margin: DEFAULT_TOP_MARGIN,
            note_spacing: DEFAULT_NOTE_SPACING,
            extra_spacing: DEFAULT_EXTRA_SPACING,
            column_width: DEFAULT_COLUMN_WIDTH,
            column_spacing: DEFAULT_COLUMN_SPACING,
            notes_per_column: None,
        }
    }
}

/// Where each decoration kind is drawn relative to its note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorationMetrics {
    pub octave_mark: Placement,
    pub alteration_mark: Placement,
    pub duration_dot: Placement,
    pub duration_lines: Placement,
    /// Gap between parallel duration lines.
    pub line_spacing: f64,
    pub max_duration_lines: u8,
}

impl Default for DecorationMetrics {
    fn default() -> Self {
        let at = |anchor, (dx, dy): (f64, f64)| Placement {
            anchor,
            offset: Offset { dx, dy },
        };
        Self {
            octave_mark: at(Anchor::Left, OCTAVE_MARK_OFFSET),
            alteration_mark: at(Anchor::Left, ALTERATION_MARK_OFFSET),
            duration_dot: at(Anchor::Below, DURATION_DOT_OFFSET),
            duration_lines: at(Anchor::Right, DURATION_LINE_OFFSET),
            line_spacing: DURATION_LINE_SPACING,
            max_duration_lines: MAX_DURATION_LINES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub layout: LayoutOptions,
    pub decorations: DecorationMetrics,
}

impl RenderOptions {
    /// Load options from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
