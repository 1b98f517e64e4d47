//! Native JSON format — a direct structural encoding of [`ScoreModel`].

use serde::Deserialize;

use super::{Format, FormatCodec, ParseOutcome};
use crate::error::{ParseError, SerializeError, ShakuResult, ValidationError, ValidationKind};
use crate::model::*;

pub struct JsonCodec;

impl FormatCodec for JsonCodec {
    fn format(&self) -> Format {
        Format::Json
    }

    fn parse(&self, text: &str) -> ShakuResult<ParseOutcome> {
        parse_json(text).map(ParseOutcome::clean)
    }

    fn serialize(&self, score: &ScoreModel) -> ShakuResult<String> {
        serialize_json(score)
    }
}

// ─── Wire shape ──────────────────────────────────────────────────────
//
// Decoding goes through these loosely-typed records so that bad steps and
// registers are reported with the index of the note that carries them.

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonScore {
    title: Option<String>,
    composer: Option<String>,
    tempo: Option<String>,
    key: Option<String>,
    notes: Vec<JsonNote>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonNote {
    pitch: Option<JsonPitch>,
    #[serde(default)]
    rest: bool,
    duration: Duration,
    #[serde(default)]
    alteration: Alteration,
    #[serde(default)]
    dotted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonPitch {
    step: String,
    octave: i64,
}

impl JsonNote {
    fn into_note(self, index: usize) -> Result<ScoreNote, ValidationError> {
        let pitch = match self.pitch {
            Some(p) => {
                let step = PitchStep::from_name(&p.step).ok_or_else(|| {
                    ValidationError::note(index, ValidationKind::UnknownStep(p.step.clone()))
                })?;
                let octave = Register::from_index(p.octave).ok_or_else(|| {
                    ValidationError::note(index, ValidationKind::RegisterOutOfRange(p.octave))
                })?;
                Some(Pitch::new(step, octave))
            }
            None => None,
        };
        let note = ScoreNote {
            pitch,
            rest: self.rest,
            duration: self.duration,
            alteration: self.alteration,
            dotted: self.dotted,
        };
        note.validate(index)?;
        Ok(note)
    }
}

/// Decode a native JSON score and validate it.
pub fn parse_json(text: &str) -> ShakuResult<ScoreModel> {
    let raw: JsonScore =
        serde_json::from_str(text).map_err(|e| ParseError::Json(e.to_string()))?;

    let notes = raw
        .notes
        .into_iter()
        .enumerate()
        .map(|(i, n)| n.into_note(i))
        .collect::<Result<Vec<_>, _>>()?;

    let header = ScoreHeader {
        title: raw.title,
        composer: raw.composer,
        tempo: raw.tempo,
        key: raw.key,
    };
    let score = ScoreModel::new(header, notes)?;
    log::debug!("json: parsed '{}' with {} notes", score.title(), score.notes().len());
    Ok(score)
}

/// Encode a score as pretty-printed JSON.
pub fn serialize_json(score: &ScoreModel) -> ShakuResult<String> {
    serde_json::to_string_pretty(score).map_err(|e| SerializeError::Json(e.to_string()).into())
}
