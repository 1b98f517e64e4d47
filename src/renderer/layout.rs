//! Layout computation — splits a note sequence into vertical columns and
//! positions every note.
//!
//! Columns read right to left: column 0 holds the earliest notes and sits
//! at the right edge of a block centred in the viewport.

use std::ops::Range;

use serde::Serialize;

use super::modifiers::DecoratedNote;
use super::options::LayoutOptions;

// ═══════════════════════════════════════════════════════════════════════
// Layout structures
// ═══════════════════════════════════════════════════════════════════════

/// Centre of one note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NotePosition {
    pub index: usize,
    pub column: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub index: usize,
    /// Horizontal centre of the column.
    pub x: f64,
    /// Source indices of the notes in this column.
    pub note_range: Range<usize>,
    pub note_positions: Vec<NotePosition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnLayout {
    pub notes_per_column: usize,
    /// Width of the centred column block.
    pub total_width: f64,
    /// Centre of column 0.
    pub start_x: f64,
    pub columns: Vec<ColumnInfo>,
}

impl ColumnLayout {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn positions(&self) -> impl Iterator<Item = &NotePosition> {
        self.columns.iter().flat_map(|c| c.note_positions.iter())
    }

    pub fn position_of(&self, index: usize) -> Option<&NotePosition> {
        let column = self
            .columns
            .iter()
            .find(|c| c.note_range.contains(&index))?;
        column.note_positions.get(index - column.note_range.start)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Capacity
// ═══════════════════════════════════════════════════════════════════════

/// Notes per column for a viewport of the given height.
///
/// An explicit capacity wins; otherwise as many notes as fit below the top
/// margin, never fewer than one. A non-positive spacing puts every note in
/// one column.
pub fn column_capacity(note_count: usize, height: f64, options: &LayoutOptions) -> usize {
    if let Some(explicit) = options.notes_per_column {
        return explicit.max(1);
    }
    if options.note_spacing.is_nan() || options.note_spacing <= 0.0 {
        return note_count.max(1);
    }
    let fit = ((height - options.top_margin) / options.note_spacing).floor();
    if fit >= 1.0 {
        fit as usize
    } else {
        1
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Main layout computation
// ═══════════════════════════════════════════════════════════════════════

/// Lay out decorated notes in a `width` × `height` viewport.
pub fn layout(
    notes: &[DecoratedNote],
    width: f64,
    height: f64,
    options: &LayoutOptions,
) -> ColumnLayout {
    let footprints: Vec<bool> = notes.iter().map(DecoratedNote::has_extra_footprint).collect();
    layout_footprints(&footprints, width, height, options)
}

/// Layout driven only by each note's extra-footprint flag.
pub fn layout_footprints(
    footprints: &[bool],
    width: f64,
    height: f64,
    options: &LayoutOptions,
) -> ColumnLayout {
    let capacity = column_capacity(footprints.len(), height, options);

    if footprints.is_empty() {
        return ColumnLayout {
            notes_per_column: capacity,
            total_width: 0.0,
            start_x: width / 2.0,
            columns: Vec::new(),
        };
    }

    let column_count = footprints.len().div_ceil(capacity);
    let cols = column_count as f64;
    let total_width = cols * options.column_width + (cols - 1.0) * options.column_spacing;
    let start_x = (width - total_width) / 2.0 + total_width - options.column_width / 2.0;
    let step = options.column_width + options.column_spacing;

    let columns = footprints
        .chunks(capacity)
        .enumerate()
        .map(|(col, chunk)| {
            let x = start_x - col as f64 * step;
            let first = col * capacity;
            let mut y = options.top_margin;
            let mut note_positions = Vec::with_capacity(chunk.len());
            for (offset, extra) in chunk.iter().enumerate() {
                note_positions.push(NotePosition {
                    index: first + offset,
                    column: col,
                    x,
                    y,
                });
                y += options.note_spacing;
                if *extra {
                    y += options.extra_spacing;
                }
            }
            ColumnInfo {
                index: col,
                x,
                note_range: first..first + chunk.len(),
                note_positions,
            }
        })
        .collect::<Vec<_>>();

    log::debug!(
        "layout: {} notes in {} columns of {}",
        footprints.len(),
        columns.len(),
        capacity
    );

    ColumnLayout {
        notes_per_column: capacity,
        total_width,
        start_x,
        columns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn capacity_from_height() {
        let opts = LayoutOptions::default();
        assert_eq!(column_capacity(25, 600.0, &opts), 12);
        assert_eq!(column_capacity(25, 40.0, &opts), 1);
        assert_eq!(column_capacity(25, 0.0, &opts), 1);
    }

    #[test]
    fn explicit_capacity_is_at_least_one() {
        let opts = LayoutOptions {
            notes_per_column: Some(0),
            ..Default::default()
        };
        assert_eq!(column_capacity(5, 600.0, &opts), 1);
    }

    #[test]
    fn zero_spacing_uses_one_column() {
        let opts = LayoutOptions {
            note_spacing: 0.0,
            ..Default::default()
        };
        assert_eq!(column_capacity(7, 600.0, &opts), 7);
        let layout = layout_footprints(&[false; 7], 400.0, 600.0, &opts);
        assert_eq!(layout.column_count(), 1);
    }

    #[test]
    fn columns_read_right_to_left() {
        let opts = LayoutOptions {
            notes_per_column: Some(2),
            ..Default::default()
        };
        let layout = layout_footprints(&[false; 5], 400.0, 600.0, &opts);
        // T = 3*60 + 2*20 = 220; start = 90 + 220 - 30 = 280.
        assert_eq!(layout.total_width, 220.0);
        assert_eq!(layout.start_x, 280.0);
        let xs: Vec<f64> = layout.columns.iter().map(|c| c.x).collect();
        assert_eq!(xs, [280.0, 200.0, 120.0]);
        assert_eq!(layout.columns[2].note_range, 4..5);
        assert_eq!(layout.position_of(3).map(|p| (p.column, p.y)), Some((1, 78.0)));
        assert_eq!(layout.position_of(5), None);
    }

    #[test]
    fn y_resets_per_column() {
        let opts = LayoutOptions {
            notes_per_column: Some(2),
            ..Default::default()
        };
        let layout = layout_footprints(&[true, true, false], 400.0, 600.0, &opts);
        let ys: Vec<f64> = layout.positions().map(|p| p.y).collect();
        assert_eq!(ys, [34.0, 90.0, 34.0]);
    }

    #[test]
    fn empty_input_has_no_columns() {
        let layout = layout_footprints(&[], 400.0, 600.0, &LayoutOptions::default());
        assert!(layout.columns.is_empty());
        assert_eq!(layout.positions().count(), 0);
    }
}
