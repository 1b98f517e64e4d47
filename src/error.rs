//! Error types for parsing, validation and serialization.
//!
//! Every failure is a structured value: an error kind, the offending note
//! index where one exists, and a human-readable message.

use std::fmt;

use thiserror::Error;

use crate::codec::Format;

/// Result type for library operations.
pub type ShakuResult<T> = Result<T, ShakuError>;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: missing header, zero notes, bad tokens.
    Structural,
    /// A pitch or duration has no counterpart in the target vocabulary.
    Mapping,
    /// A score model invariant does not hold.
    Validation,
}

/// Top-level error type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShakuError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ShakuError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShakuError::Parse(ParseError::Mapping { .. }) => ErrorKind::Mapping,
            ShakuError::Parse(_) => ErrorKind::Structural,
            ShakuError::Serialize(SerializeError::Unspellable { .. }) => ErrorKind::Mapping,
            ShakuError::Serialize(_) => ErrorKind::Structural,
            ShakuError::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Index of the note the failure refers to, if any.
    pub fn note_index(&self) -> Option<usize> {
        match self {
            ShakuError::Parse(ParseError::Mapping { note_index, .. }) => Some(*note_index),
            ShakuError::Parse(_) => None,
            ShakuError::Serialize(SerializeError::Unspellable { note_index, .. }) => {
                Some(*note_index)
            }
            ShakuError::Serialize(_) => None,
            ShakuError::Validation(e) => e.note_index,
        }
    }
}

/// Fatal parsing errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Required structure is missing or the document is otherwise malformed.
    #[error("{format}: {message}")]
    Structural { format: Format, message: String },

    /// A token that does not follow the format's grammar.
    #[error("{format}: invalid token '{token}' on line {line}: {message}")]
    InvalidToken {
        format: Format,
        token: String,
        line: usize,
        message: String,
    },

    /// A pitch or duration the instrument cannot express.
    #[error("{format}: cannot map '{token}' (note {note_index}): {message}")]
    Mapping {
        format: Format,
        token: String,
        note_index: usize,
        message: String,
    },

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("JSON parse error: {0}")]
    Json(String),

    #[error("MXL archive error: {0}")]
    Archive(String),

    #[error("invalid text encoding: {0}")]
    Encoding(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ParseError {
    pub(crate) fn structural(format: Format, message: impl Into<String>) -> Self {
        Self::Structural {
            format,
            message: message.into(),
        }
    }
}

/// Which score invariant was violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationKind {
    MissingTitle,
    NoNotes,
    PitchAndRest,
    MissingPitch,
    NonPositiveDuration,
    RegisterOutOfRange(i64),
    UnknownStep(String),
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationKind::MissingTitle => write!(f, "title is empty"),
            ValidationKind::NoNotes => write!(f, "score contains no notes"),
            ValidationKind::PitchAndRest => write!(f, "note has both a pitch and the rest flag"),
            ValidationKind::MissingPitch => write!(f, "note has neither a pitch nor the rest flag"),
            ValidationKind::NonPositiveDuration => write!(f, "duration must be greater than zero"),
            ValidationKind::RegisterOutOfRange(v) => {
                write!(f, "octave register {v} is outside 0..=2")
            }
            ValidationKind::UnknownStep(s) => write!(f, "unknown fingering step '{s}'"),
        }
    }
}

/// A score model invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    /// Offending note, or `None` for score-level invariants.
    pub note_index: Option<usize>,
    pub kind: ValidationKind,
}

impl ValidationError {
    pub fn score(kind: ValidationKind) -> Self {
        Self {
            note_index: None,
            kind,
        }
    }

    pub fn note(note_index: usize, kind: ValidationKind) -> Self {
        Self {
            note_index: Some(note_index),
            kind,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.note_index {
            Some(i) => write!(f, "invalid note {i}: {}", self.kind),
            None => write!(f, "invalid score: {}", self.kind),
        }
    }
}

/// Serialization failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializeError {
    #[error("{format}: note {note_index} cannot be written: {message}")]
    Unspellable {
        format: Format,
        note_index: usize,
        message: String,
    },

    #[error("{format}: header cannot be written: {message}")]
    Header { format: Format, message: String },

    #[error("JSON serialization error: {0}")]
    Json(String),
}

/// A recoverable problem found during a best-effort import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// Position of the skipped element among the source's notes.
    pub note_index: usize,
    /// The source spelling that could not be mapped.
    pub token: String,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "skipped note {} ('{}'): {}",
            self.note_index, self.token, self.message
        )
    }
}
