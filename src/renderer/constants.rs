//! Default geometry for the column renderer (all in SVG user units).

// ── Column layout ───────────────────────────────────────────────────
pub(super) const DEFAULT_TOP_MARGIN: f64 = 34.0;
pub(super) const DEFAULT_NOTE_SPACING: f64 = 44.0; // centre-to-centre within a column
pub(super) const DEFAULT_EXTRA_SPACING: f64 = 12.0; // added below a note with a duration dot
pub(super) const DEFAULT_COLUMN_WIDTH: f64 = 60.0;
pub(super) const DEFAULT_COLUMN_SPACING: f64 = 20.0;

// ── Decoration offsets (relative to the note centre) ────────────────
pub(super) const OCTAVE_MARK_OFFSET: (f64, f64) = (-22.0, -10.0);
pub(super) const ALTERATION_MARK_OFFSET: (f64, f64) = (-22.0, 10.0);
pub(super) const DURATION_DOT_OFFSET: (f64, f64) = (0.0, 22.0);
pub(super) const DURATION_LINE_OFFSET: (f64, f64) = (18.0, 0.0);
pub(super) const DURATION_LINE_SPACING: f64 = 4.0; // between parallel lines

// ── Duration lines ──────────────────────────────────────────────────
pub(super) const MAX_DURATION_LINES: u8 = 3;
