//! Decoration resolution — decides which instrument-specific marks attach
//! to each note.
//!
//! Marks depend on musical context: whether a note needs an octave mark is
//! decided against the previous *sounding* note, and duration lines of
//! neighbouring notes join into connected runs. Both are sequential folds
//! over the note list.

use num_rational::Ratio;
use serde::{Deserialize, Serialize};

use super::options::DecorationMetrics;
use crate::model::{Alteration, Pitch, Register, ScoreNote};

// ═══════════════════════════════════════════════════════════════════════
// Decoration types
// ═══════════════════════════════════════════════════════════════════════

/// Side of the note a decoration hangs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Above,
    Below,
    Left,
    Right,
}

/// Pixel offset from the anchor point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub anchor: Anchor,
    #[serde(default)]
    pub offset: Offset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecorationKind {
    /// The note is played in a register other than the closest one.
    OctaveMark { register: Register },
    AlterationMark { level: Alteration },
    DurationDot,
    /// `terminal` is false when the line continues to the next note.
    DurationLines { count: u8, terminal: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decoration {
    pub kind: DecorationKind,
    pub anchor: Anchor,
    pub offset: Offset,
}

/// A note together with the decorations drawn around it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecoratedNote {
    /// Position in the source note list.
    pub index: usize,
    pub note: ScoreNote,
    pub decorations: Vec<Decoration>,
}

impl DecoratedNote {
    /// Whether the note needs extra room below it (it carries a dot).
    pub fn has_extra_footprint(&self) -> bool {
        self.decorations
            .iter()
            .any(|d| matches!(d.kind, DecorationKind::DurationDot))
    }

    pub fn octave_mark(&self) -> Option<Register> {
        self.decorations.iter().find_map(|d| match d.kind {
            DecorationKind::OctaveMark { register } => Some(register),
            _ => None,
        })
    }

    /// Line count and terminal flag, if the note has duration lines.
    pub fn duration_lines(&self) -> Option<(u8, bool)> {
        self.decorations.iter().find_map(|d| match d.kind {
            DecorationKind::DurationLines { count, terminal } => Some((count, terminal)),
            _ => None,
        })
    }

    pub fn decoration(&self, pred: impl Fn(&DecorationKind) -> bool) -> Option<&Decoration> {
        self.decorations.iter().find(|d| pred(&d.kind))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Rules
// ═══════════════════════════════════════════════════════════════════════

/// Register assumed for `step` when no octave mark is written: the one whose
/// sounding pitch is nearest the previous sounding note. Ties go low.
pub fn expected_register(note: &ScoreNote, previous: Option<(Pitch, Alteration)>) -> Register {
    let (Some(pitch), Some((prev, prev_alt))) = (note.sounding_pitch(), previous) else {
        return Register::Otsu;
    };
    let target = prev.cents(prev_alt);
    Register::ALL
        .into_iter()
        .min_by_key(|r| (Pitch::new(pitch.step, *r).cents(note.alteration) - target).abs())
        .unwrap_or(Register::Otsu)
}

/// Number of duration lines for a note, or `None` for half notes and longer.
///
/// A quarter gets one line and each halving adds one, up to `max`.
pub fn duration_line_count(note: &ScoreNote, max: u8) -> Option<u8> {
    let two = Ratio::from_integer(2u32);
    let one = Ratio::from_integer(1u32);
    let mut value = note.duration.ratio();
    if value >= two {
        return None;
    }
    let mut count = 1u8;
    while value < one && count < max {
        value = value * two;
        count += 1;
    }
    Some(count.max(1))
}

/// Resolves decorations for a note sequence using a set of metrics.
pub struct ModifierResolver<'a> {
    metrics: &'a DecorationMetrics,
}

impl<'a> ModifierResolver<'a> {
    pub fn new(metrics: &'a DecorationMetrics) -> Self {
        Self { metrics }
    }

    fn place(&self, kind: DecorationKind) -> Decoration {
        let placement = match kind {
            DecorationKind::OctaveMark { .. } => self.metrics.octave_mark,
            DecorationKind::AlterationMark { .. } => self.metrics.alteration_mark,
            DecorationKind::DurationDot => self.metrics.duration_dot,
            DecorationKind::DurationLines { .. } => self.metrics.duration_lines,
        };
        Decoration {
            kind,
            anchor: placement.anchor,
            offset: placement.offset,
        }
    }

    pub fn resolve(&self, notes: &[ScoreNote]) -> Vec<DecoratedNote> {
        let lines: Vec<Option<u8>> = notes
            .iter()
            .map(|n| duration_line_count(n, self.metrics.max_duration_lines))
            .collect();

        let mut previous: Option<(Pitch, Alteration)> = None;
        let mut out = Vec::with_capacity(notes.len());

        for (i, note) in notes.iter().enumerate() {
            let mut decorations = Vec::new();

            if let Some(pitch) = note.sounding_pitch() {
                let expected = expected_register(note, previous);
                if pitch.octave != expected {
                    decorations.push(self.place(DecorationKind::OctaveMark {
                        register: pitch.octave,
                    }));
                }
                if !note.alteration.is_none() {
                    decorations.push(self.place(DecorationKind::AlterationMark {
                        level: note.alteration,
                    }));
                }
                previous = Some((pitch, note.alteration));
            }

            if note.dotted {
                decorations.push(self.place(DecorationKind::DurationDot));
            }

            if let Some(count) = lines[i] {
                // Rests never join a run; a sounding note joins the next one
                // when that is also a sounding note with lines.
                let continues = note.sounding_pitch().is_some()
                    && notes.get(i + 1).map_or(false, |next| {
                        next.sounding_pitch().is_some() && lines[i + 1].is_some()
                    });
                decorations.push(self.place(DecorationKind::DurationLines {
                    count,
                    terminal: !continues,
                }));
            }

            out.push(DecoratedNote {
                index: i,
                note: note.clone(),
                decorations,
            });
        }

        log::debug!("modifiers: resolved {} notes", out.len());
        out
    }
}

/// Resolve decorations with the default metrics.
pub fn resolve_modifiers(notes: &[ScoreNote]) -> Vec<DecoratedNote> {
    ModifierResolver::new(&DecorationMetrics::default()).resolve(notes)
}
