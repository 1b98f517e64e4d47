//! Data model for a shakuhachi score.
//!
//! A score is a flat sequence of notes on a D instrument. Every format codec
//! produces and consumes this model; the renderer reads it without mutating.

use std::fmt;
use std::str::FromStr;

use num_rational::Ratio;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::error::{ValidationError, ValidationKind};

/// Title used when a source document carries none.
pub const PLACEHOLDER_TITLE: &str = "Untitled";

/// One of the seven basic fingerings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchStep {
    Ro,
    Hi,
    Tsu,
    Re,
    Chi,
    U,
    Ri,
}

impl PitchStep {
    /// All steps in ascending pitch order.
    pub const ALL: [PitchStep; 7] = [
        PitchStep::Ro,
        PitchStep::Hi,
        PitchStep::Tsu,
        PitchStep::Re,
        PitchStep::Chi,
        PitchStep::U,
        PitchStep::Ri,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PitchStep::Ro => "ro",
            PitchStep::Hi => "hi",
            PitchStep::Tsu => "tsu",
            PitchStep::Re => "re",
            PitchStep::Chi => "chi",
            PitchStep::U => "u",
            PitchStep::Ri => "ri",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        PitchStep::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Semitones above the instrument's fundamental (D4) in the base register.
    pub fn semitone(self) -> i32 {
        match self {
            PitchStep::Ro => 0,
            PitchStep::Hi => 2,
            PitchStep::Tsu => 3,
            PitchStep::Re => 5,
            PitchStep::Chi => 7,
            PitchStep::U => 9,
            PitchStep::Ri => 10,
        }
    }
}

impl fmt::Display for PitchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Octave band a fingering is sounded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub enum Register {
    /// Base register (otsu).
    Otsu,
    /// One octave up (kan).
    Kan,
    /// Two octaves up (daikan).
    Daikan,
}

impl Register {
    pub const ALL: [Register; 3] = [Register::Otsu, Register::Kan, Register::Daikan];

    pub fn index(self) -> u8 {
        match self {
            Register::Otsu => 0,
            Register::Kan => 1,
            Register::Daikan => 2,
        }
    }

    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Register::Otsu),
            1 => Some(Register::Kan),
            2 => Some(Register::Daikan),
            _ => None,
        }
    }
}

impl From<Register> for u8 {
    fn from(r: Register) -> u8 {
        r.index()
    }
}

/// Embouchure lowering applied to a fingering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alteration {
    #[default]
    None,
    /// Meri: one semitone down.
    Half,
    /// Chu-meri: a quarter tone down.
    Quarter,
    /// Dai-meri: a whole tone down.
    Whole,
}

impl Alteration {
    /// How far the alteration lowers the pitch, in cents.
    pub fn cents(self) -> i32 {
        match self {
            Alteration::None => 0,
            Alteration::Half => 100,
            Alteration::Quarter => 50,
            Alteration::Whole => 200,
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Alteration::None
    }
}

/// A fingering in a specific register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Pitch {
    pub step: PitchStep,
    pub octave: Register,
}

impl Pitch {
    pub fn new(step: PitchStep, octave: Register) -> Self {
        Self { step, octave }
    }

    /// Semitones above D4, ignoring any alteration.
    pub fn semitone(&self) -> i32 {
        self.step.semitone() + 12 * i32::from(self.octave.index())
    }

    /// Sounding pitch in cents above D4 once `alteration` is applied.
    pub fn cents(&self, alteration: Alteration) -> i32 {
        self.semitone() * 100 - alteration.cents()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Duration
// ═══════════════════════════════════════════════════════════════════════

/// Note length in quarter-note units (whole = 4, eighth = 1/2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Duration(Ratio<u32>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration '{0}'")]
pub struct InvalidDuration(pub String);

impl Duration {
    pub const WHOLE: Duration = Duration(Ratio::new_raw(4, 1));
    pub const HALF: Duration = Duration(Ratio::new_raw(2, 1));
    pub const QUARTER: Duration = Duration(Ratio::new_raw(1, 1));
    pub const EIGHTH: Duration = Duration(Ratio::new_raw(1, 2));
    pub const SIXTEENTH: Duration = Duration(Ratio::new_raw(1, 4));

    /// Returns `None` when `denom` is zero.
    pub fn new(numer: u32, denom: u32) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        Some(Self(Ratio::new(numer, denom)))
    }

    pub fn from_integer(value: u32) -> Self {
        Self(Ratio::from_integer(value))
    }

    pub fn from_ratio(ratio: Ratio<u32>) -> Self {
        Self(ratio)
    }

    /// Accept a float only when it is an exact binary fraction.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        for shift in 0..=10u32 {
            let denom = 1u32 << shift;
            let scaled = value * f64::from(denom);
            if scaled.fract() == 0.0 && scaled <= f64::from(u32::MAX) {
                return Some(Self(Ratio::new(scaled as u32, denom)));
            }
        }
        None
    }

    pub fn ratio(&self) -> Ratio<u32> {
        self.0
    }

    pub fn numer(&self) -> u32 {
        *self.0.numer()
    }

    pub fn denom(&self) -> u32 {
        *self.0.denom()
    }

    pub fn is_positive(&self) -> bool {
        self.numer() > 0
    }

    pub fn as_f64(&self) -> f64 {
        f64::from(self.numer()) / f64::from(self.denom())
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom() == 1 {
            write!(f, "{}", self.numer())
        } else {
            write!(f, "{}/{}", self.numer(), self.denom())
        }
    }
}

impl FromStr for Duration {
    type Err = InvalidDuration;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidDuration(s.to_string());
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((n, d)) => {
                let numer = n.trim().parse::<u32>().map_err(|_| invalid())?;
                let denom = d.trim().parse::<u32>().map_err(|_| invalid())?;
                Duration::new(numer, denom).ok_or_else(invalid)
            }
            None => trimmed
                .parse::<u32>()
                .map(Duration::from_integer)
                .map_err(|_| invalid()),
        }
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.denom() == 1 {
            serializer.serialize_u32(self.numer())
        } else {
            serializer.collect_str(self)
        }
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DurationVisitor)
    }
}

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer, a binary fraction or an \"n/d\" string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
        u32::try_from(v)
            .map(Duration::from_integer)
            .map_err(|_| E::custom(format!("duration {v} is too large")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
        if v < 0 {
            return Err(E::custom(format!("duration {v} is negative")));
        }
        self.visit_u64(v as u64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Duration, E> {
        Duration::from_f64(v)
            .ok_or_else(|| E::custom(format!("duration {v} is not an exact binary fraction")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
        v.parse().map_err(E::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Notes and scores
// ═══════════════════════════════════════════════════════════════════════

/// A single note or rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreNote {
    /// Fingering and register (None for a rest)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch: Option<Pitch>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub rest: bool,
    pub duration: Duration,
    pub alteration: Alteration,
    pub dotted: bool,
}

impl ScoreNote {
    pub fn note(pitch: Pitch, duration: Duration) -> Self {
        Self {
            pitch: Some(pitch),
            rest: false,
            duration,
            alteration: Alteration::None,
            dotted: false,
        }
    }

    pub fn rest(duration: Duration) -> Self {
        Self {
            pitch: None,
            rest: true,
            duration,
            alteration: Alteration::None,
            dotted: false,
        }
    }

    pub fn with_alteration(mut self, alteration: Alteration) -> Self {
        self.alteration = alteration;
        self
    }

    pub fn with_dot(mut self) -> Self {
        self.dotted = true;
        self
    }

    /// The pitch of a sounding note; `None` for rests.
    pub fn sounding_pitch(&self) -> Option<Pitch> {
        if self.rest {
            None
        } else {
            self.pitch
        }
    }

    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        match (self.pitch.is_some(), self.rest) {
            (true, true) => {
                return Err(ValidationError::note(index, ValidationKind::PitchAndRest))
            }
            (false, false) => {
                return Err(ValidationError::note(index, ValidationKind::MissingPitch))
            }
            _ => {}
        }
        if !self.duration.is_positive() {
            return Err(ValidationError::note(
                index,
                ValidationKind::NonPositiveDuration,
            ));
        }
        Ok(())
    }
}

/// Optional metadata used when building a score.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreHeader {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub tempo: Option<String>,
    pub key: Option<String>,
}

/// A validated score. Fields are read-only; every transformation builds a
/// new value through [`ScoreModel::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreModel {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    composer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tempo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    notes: Vec<ScoreNote>,
}

impl ScoreModel {
    /// Build and validate a score. A missing title becomes the placeholder;
    /// a present but blank title is rejected.
    pub fn new(header: ScoreHeader, notes: Vec<ScoreNote>) -> Result<Self, ValidationError> {
        let title = header
            .title
            .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string());
        let model = Self {
            title,
            composer: header.composer,
            tempo: header.tempo,
            key: header.key,
            notes,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::score(ValidationKind::MissingTitle));
        }
        if self.notes.is_empty() {
            return Err(ValidationError::score(ValidationKind::NoNotes));
        }
        for (i, note) in self.notes.iter().enumerate() {
            note.validate(i)?;
        }
        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn composer(&self) -> Option<&str> {
        self.composer.as_deref()
    }

    pub fn tempo(&self) -> Option<&str> {
        self.tempo.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn notes(&self) -> &[ScoreNote] {
        &self.notes
    }

    pub fn header(&self) -> ScoreHeader {
        ScoreHeader {
            title: Some(self.title.clone()),
            composer: self.composer.clone(),
            tempo: self.tempo.clone(),
            key: self.key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ro() -> Pitch {
        Pitch::new(PitchStep::Ro, Register::Otsu)
    }

    #[test]
    fn missing_title_uses_placeholder() {
        let score = ScoreModel::new(
            ScoreHeader::default(),
            vec![ScoreNote::note(ro(), Duration::QUARTER)],
        )
        .unwrap();
        assert_eq!(score.title(), PLACEHOLDER_TITLE);
    }

    #[test]
    fn blank_title_is_rejected() {
        let header = ScoreHeader {
            title: Some("  ".into()),
            ..Default::default()
        };
        let err = ScoreModel::new(header, vec![ScoreNote::note(ro(), Duration::QUARTER)])
            .unwrap_err();
        assert_eq!(err.kind, ValidationKind::MissingTitle);
        assert_eq!(err.note_index, None);
    }

    #[test]
    fn empty_score_is_rejected() {
        let err = ScoreModel::new(ScoreHeader::default(), Vec::new()).unwrap_err();
        assert_eq!(err.kind, ValidationKind::NoNotes);
    }

    #[test]
    fn validation_reports_offending_note() {
        let mut bad = ScoreNote::note(ro(), Duration::QUARTER);
        bad.rest = true;
        let notes = vec![
            ScoreNote::note(ro(), Duration::QUARTER),
            ScoreNote::rest(Duration::HALF),
            bad,
        ];
        let err = ScoreModel::new(ScoreHeader::default(), notes).unwrap_err();
        assert_eq!(err.note_index, Some(2));
        assert_eq!(err.kind, ValidationKind::PitchAndRest);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let notes = vec![ScoreNote::note(ro(), Duration::from_integer(0))];
        let err = ScoreModel::new(ScoreHeader::default(), notes).unwrap_err();
        assert_eq!(err.kind, ValidationKind::NonPositiveDuration);
        assert_eq!(err.note_index, Some(0));
    }

    #[test]
    fn duration_parses_fractions() {
        assert_eq!("1/2".parse::<Duration>().unwrap(), Duration::EIGHTH);
        assert_eq!("4".parse::<Duration>().unwrap(), Duration::WHOLE);
        assert_eq!("2/4".parse::<Duration>().unwrap(), Duration::EIGHTH);
        assert!("1/0".parse::<Duration>().is_err());
        assert!("x".parse::<Duration>().is_err());
    }

    #[test]
    fn duration_from_binary_float() {
        assert_eq!(Duration::from_f64(0.25), Some(Duration::SIXTEENTH));
        assert_eq!(Duration::from_f64(1.5), Duration::new(3, 2));
        assert_eq!(Duration::from_f64(0.1), None);
        assert_eq!(Duration::from_f64(-1.0), None);
    }

    #[test]
    fn cents_include_alteration() {
        let ri = Pitch::new(PitchStep::Ri, Register::Otsu);
        assert_eq!(ri.cents(Alteration::None), 1000);
        assert_eq!(ri.cents(Alteration::Quarter), 950);
        let kan_ro = Pitch::new(PitchStep::Ro, Register::Kan);
        assert_eq!(kan_ro.cents(Alteration::Whole), 1000);
    }
}
