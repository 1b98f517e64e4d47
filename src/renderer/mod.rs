//! Score renderer — turns a score into positioned notes and decorations.
//!
//! Drawing is left to the host: the output of [`render_layout`] carries the
//! centre of every note, the decorations hanging from it, and the end points
//! of each duration-line connector.

mod constants;
pub mod layout;
pub mod modifiers;
pub mod options;

use serde::Serialize;

use crate::model::*;
pub use layout::{column_capacity, layout, layout_footprints, ColumnInfo, ColumnLayout, NotePosition};
pub use modifiers::{
    resolve_modifiers, Anchor, DecoratedNote, Decoration, DecorationKind, ModifierResolver, Offset,
    Placement,
};
pub use options::{DecorationMetrics, LayoutOptions, RenderOptions};

// ═══════════════════════════════════════════════════════════════════════
// Output structures
// ═══════════════════════════════════════════════════════════════════════

/// Vertical duration lines beside a note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineSegment {
    pub count: u8,
    /// Horizontal gap between parallel lines.
    pub spacing: f64,
    pub x: f64,
    pub y_start: f64,
    pub y_end: f64,
    /// Whether the line reaches the next note.
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedNote {
    pub index: usize,
    pub column: usize,
    pub x: f64,
    pub y: f64,
    pub note: ScoreNote,
    pub decorations: Vec<Decoration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<LineSegment>,
}

/// Everything a drawing backend needs for one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedScore {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    pub width: f64,
    pub height: f64,
    pub layout: ColumnLayout,
    pub notes: Vec<PlacedNote>,
}

impl RenderedScore {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════

/// Resolve decorations and lay out `score` in a `width` × `height` viewport.
pub fn render_layout(
    score: &ScoreModel,
    width: f64,
    height: f64,
    options: &RenderOptions,
) -> RenderedScore {
    let decorated = ModifierResolver::new(&options.decorations).resolve(score.notes());
    let column_layout = layout(&decorated, width, height, &options.layout);

    let mut notes = Vec::with_capacity(decorated.len());
    for d in decorated {
        let Some(pos) = column_layout.position_of(d.index).copied() else {
            continue;
        };
        let line = line_segment(&d, &pos, &column_layout, &options.decorations);
        notes.push(PlacedNote {
            index: d.index,
            column: pos.column,
            x: pos.x,
            y: pos.y,
            note: d.note,
            decorations: d.decorations,
            line,
        });
    }

    RenderedScore {
        title: score.title().to_string(),
        composer: score.composer().map(String::from),
        width,
        height,
        layout: column_layout,
        notes,
    }
}

/// The connector of a non-terminal note runs to the next note's centre when
/// both share a column; otherwise it stops at the note's own centre.
fn line_segment(
    note: &DecoratedNote,
    pos: &NotePosition,
    column_layout: &ColumnLayout,
    metrics: &DecorationMetrics,
) -> Option<LineSegment> {
    let (count, terminal) = note.duration_lines()?;
    let offset = metrics.duration_lines.offset;
    let next = if terminal {
        None
    } else {
        column_layout
            .position_of(note.index + 1)
            .filter(|next| next.column == pos.column)
    };
    Some(LineSegment {
        count,
        spacing: metrics.line_spacing,
        x: pos.x + offset.dx,
        y_start: pos.y + offset.dy,
        y_end: next.map_or(pos.y, |n| n.y) + offset.dy,
        connected: next.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eighths(count: usize) -> ScoreModel {
        let notes = (0..count)
            .map(|_| ScoreNote::note(Pitch::new(PitchStep::Re, Register::Otsu), Duration::EIGHTH))
            .collect();
        ScoreModel::new(ScoreHeader::default(), notes).unwrap()
    }

    #[test]
    fn run_connects_within_a_column() {
        let mut options = RenderOptions::default();
        options.layout.notes_per_column = Some(2);
        let rendered = render_layout(&eighths(3), 400.0, 600.0, &options);

        let first = rendered.notes[0].line.unwrap();
        assert!(first.connected);
        assert_eq!((first.y_start, first.y_end), (34.0, 78.0));
        assert_eq!(first.x, rendered.notes[0].x + 18.0);

        // The run continues into the next column, but the connector cannot.
        let second = rendered.notes[1].line.unwrap();
        assert!(!second.connected);
        assert_eq!(second.y_end, second.y_start);

        let last = rendered.notes[2].line.unwrap();
        assert!(!last.connected);
    }

    #[test]
    fn serializes_for_hosts() {
        let rendered = render_layout(&eighths(1), 200.0, 300.0, &RenderOptions::default());
        let value: serde_json::Value = serde_json::from_str(&rendered.to_json().unwrap()).unwrap();
        assert_eq!(value["title"], PLACEHOLDER_TITLE);
        assert_eq!(value["notes"][0]["decorations"][0]["kind"]["kind"], "duration_lines");
        assert_eq!(value["layout"]["columns"][0]["note_range"]["end"], 1);
    }
}
