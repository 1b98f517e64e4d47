//! Tablature text format (ABC-style).
//!
//! A document is a block of `Letter:value` header lines terminated by the
//! mandatory `K:` field, followed by body lines of note tokens. Recognized
//! header fields:
//!
//! | Field | Meaning                                  |
//! |-------|------------------------------------------|
//! | `T:`  | title (first one wins)                   |
//! | `C:`  | composer                                 |
//! | `Q:`  | tempo, kept verbatim                     |
//! | `L:`  | unit note length, default `1/8`          |
//! | `K:`  | key; `none` or empty means no key        |
//!
//! Other fields (`X:`, `M:`, ...) are accepted and ignored. In the header a
//! `%` only starts a comment at the beginning of a line, so titles may
//! contain it; in the body it comments out the rest of the line. Body lines
//! such as `w:` are skipped unless the letter can open a note, so `G:|` is
//! read as notes. Accidentals are
//! always written explicitly on each note; the key signature never alters
//! a token. Unlike the MusicXML reader this parser is strict: any token it
//! cannot read or map to a fingering aborts the parse.

mod token;
mod writer;

use num_rational::Ratio;

use self::token::{is_note_letter, tokenize_line, NoteToken, TokenKind};
use super::{Format, FormatCodec, ParseOutcome};
use crate::error::{ParseError, ShakuResult};
use crate::model::{Duration, ScoreHeader, ScoreModel, ScoreNote};
use crate::pitch_table::lookup_by_western;

pub use self::writer::serialize_abc;

/// Unit length assumed when the header has no `L:` field.
pub const DEFAULT_UNIT: Ratio<u32> = Ratio::new_raw(1, 8);

pub struct TabletextAbcCodec;

impl FormatCodec for TabletextAbcCodec {
    fn format(&self) -> Format {
        Format::TabletextAbc
    }

    fn parse(&self, text: &str) -> ShakuResult<ParseOutcome> {
        parse_abc(text).map(ParseOutcome::clean)
    }

    fn serialize(&self, score: &ScoreModel) -> ShakuResult<String> {
        serialize_abc(score)
    }
}

fn structural(message: impl Into<String>) -> ParseError {
    ParseError::structural(Format::TabletextAbc, message)
}

/// Split `X:value` into its field letter and trimmed value.
fn field(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_alphabetic() || chars.next()? != ':' {
        return None;
    }
    Some((letter, line[2..].trim()))
}

/// Everything before a `%` comment.
fn strip_comment(line: &str) -> &str {
    match line.find('%') {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Parse an `L:` value such as `1/8` or `1`.
fn parse_unit(value: &str) -> Option<Ratio<u32>> {
    let (numer, denom) = match value.split_once('/') {
        Some((n, d)) => (n.trim().parse::<u32>().ok()?, d.trim().parse::<u32>().ok()?),
        None => (value.trim().parse::<u32>().ok()?, 1),
    };
    if numer == 0 || denom == 0 {
        return None;
    }
    Some(Ratio::new(numer, denom))
}

/// Decode a tablature document.
pub fn parse_abc(text: &str) -> ShakuResult<ScoreModel> {
    let mut lines = text.lines().enumerate();
    let mut header = ScoreHeader::default();
    let mut unit = DEFAULT_UNIT;
    let mut saw_key = false;

    // ─── Header ──────────────────────────────────────────────────────
    for (idx, raw) in lines.by_ref() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        let Some((letter, value)) = field(line) else {
            return Err(structural(format!(
                "line {}: expected a header field before K:, found '{line}'",
                idx + 1
            ))
            .into());
        };
        match letter {
            'T' => {
                if header.title.is_none() && !value.is_empty() {
                    header.title = Some(value.to_string());
                }
            }
            'C' => {
                if !value.is_empty() {
                    header.composer = Some(value.to_string());
                }
            }
            'Q' => {
                if !value.is_empty() {
                    header.tempo = Some(value.to_string());
                }
            }
            'L' => {
                unit = parse_unit(value).ok_or_else(|| {
                    structural(format!("line {}: invalid unit length '{value}'", idx + 1))
                })?;
            }
            'K' => {
                if !value.is_empty() && !value.eq_ignore_ascii_case("none") {
                    header.key = Some(value.to_string());
                }
                saw_key = true;
                break;
            }
            other => log::debug!("abc: ignoring header field {other}:"),
        }
    }

    if !saw_key {
        return Err(structural("missing K: field ending the header").into());
    }

    // ─── Body ────────────────────────────────────────────────────────
    let mut notes = Vec::new();
    for (idx, raw) in lines {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        if let Some((letter, _)) = field(line).filter(|(l, _)| !is_note_letter(*l)) {
            log::debug!("abc: ignoring body field {letter}: on line {}", idx + 1);
            continue;
        }
        let tokens = tokenize_line(line).map_err(|e| ParseError::InvalidToken {
            format: Format::TabletextAbc,
            token: e.token,
            line: idx + 1,
            message: e.message,
        })?;
        for token in tokens {
            let note = note_from_token(&token, unit, notes.len(), idx + 1)?;
            notes.push(note);
        }
    }

    if notes.is_empty() {
        return Err(structural("no notes after the K: field").into());
    }

    let score = ScoreModel::new(header, notes)?;
    log::debug!("abc: parsed '{}' with {} notes", score.title(), score.notes().len());
    Ok(score)
}

/// Unit is a fraction of a whole note; durations count quarters. `None` when
/// the reduced result does not fit a `u32` ratio.
fn token_duration(unit: Ratio<u32>, length: Ratio<u32>) -> Option<Duration> {
    let numer = u128::from(*unit.numer()) * 4 * u128::from(*length.numer());
    let denom = u128::from(*unit.denom()) * u128::from(*length.denom());
    let reduced = Ratio::new(numer, denom);
    let numer = u32::try_from(*reduced.numer()).ok()?;
    let denom = u32::try_from(*reduced.denom()).ok()?;
    Some(Duration::from_ratio(Ratio::new(numer, denom)))
}

fn note_from_token(
    token: &NoteToken,
    unit: Ratio<u32>,
    index: usize,
    line: usize,
) -> Result<ScoreNote, ParseError> {
    let duration =
        token_duration(unit, token.length).ok_or_else(|| ParseError::InvalidToken {
            format: Format::TabletextAbc,
            token: token.text.clone(),
            line,
            message: "note length is out of range".into(),
        })?;

    let mut note = match token.kind {
        TokenKind::Rest => ScoreNote::rest(duration),
        TokenKind::Pitched {
            letter,
            accidental,
            octave,
        } => {
            let (pitch, alteration) =
                lookup_by_western(letter, accidental, octave).ok_or_else(|| {
                    ParseError::Mapping {
                        format: Format::TabletextAbc,
                        token: token.text.clone(),
                        note_index: index,
                        message: "pitch is outside the instrument's range".into(),
                    }
                })?;
            ScoreNote::note(pitch, duration).with_alteration(alteration)
        }
    };
    if token.dotted {
        note = note.with_dot();
    }
    Ok(note)
}
