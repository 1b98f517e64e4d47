//! Tablature text output.

use std::fmt::Write;

use num_rational::Ratio;

use super::token::{token_for, DOT, REST};
use crate::codec::Format;
use crate::error::{SerializeError, ShakuError, ShakuResult};
use crate::model::{Duration, ScoreModel, ScoreNote};

/// Tokens per body line.
const TOKENS_PER_LINE: usize = 16;

/// Header values must stay on one line.
fn header_value(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `K:` value. A key spelled like the "no key" marker would not read back.
fn key_value(key: Option<&str>) -> Result<String, ShakuError> {
    let Some(key) = key else {
        return Ok("none".to_string());
    };
    let value = header_value(key);
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Err(SerializeError::Header {
            format: Format::TabletextAbc,
            message: format!("key '{key}' would read back as no key"),
        }
        .into());
    }
    Ok(value)
}

/// Length suffix relative to a quarter-note unit.
fn length_suffix(duration: Duration) -> String {
    let ratio: Ratio<u32> = duration.ratio();
    match (*ratio.numer(), *ratio.denom()) {
        (1, 1) => String::new(),
        (n, 1) => n.to_string(),
        (1, d) => format!("/{d}"),
        (n, d) => format!("{n}/{d}"),
    }
}

fn write_token(index: usize, note: &ScoreNote) -> ShakuResult<String> {
    let mut out = match note.sounding_pitch() {
        Some(pitch) => token_for(pitch, note.alteration)
            .ok_or_else(|| SerializeError::Unspellable {
                format: Format::TabletextAbc,
                note_index: index,
                message: format!("no token for {} ({:?})", pitch.step, note.alteration),
            })?
            .to_string(),
        None => REST.to_string(),
    };
    out.push_str(&length_suffix(note.duration));
    if note.dotted {
        out.push(DOT);
    }
    Ok(out)
}

/// Write a score as tablature text. The unit length is always a quarter.
pub fn serialize_abc(score: &ScoreModel) -> ShakuResult<String> {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "X:1");
    let _ = writeln!(out, "T:{}", header_value(score.title()));
    if let Some(composer) = score.composer() {
        let _ = writeln!(out, "C:{}", header_value(composer));
    }
    if let Some(tempo) = score.tempo() {
        let _ = writeln!(out, "Q:{}", header_value(tempo));
    }
    let _ = writeln!(out, "L:1/4");
    let _ = writeln!(out, "K:{}", key_value(score.key())?);

    let tokens = score
        .notes()
        .iter()
        .enumerate()
        .map(|(i, n)| write_token(i, n))
        .collect::<ShakuResult<Vec<_>>>()?;
    for line in tokens.chunks(TOKENS_PER_LINE) {
        out.push_str(&line.join(" "));
        out.push('\n');
    }

    Ok(out)
}
