//! Format codecs — conversions between text encodings and [`ScoreModel`].
//!
//! Three formats share the one model:
//! - native JSON (exactly lossless)
//! - MusicXML, the Western-staff interchange format (best-effort import)
//! - an ABC tablature dialect (strict, hand-authored)

pub mod abc;
pub mod json;
pub mod musicxml;
pub mod mxl;
mod xml_writer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ParseWarning, ShakuResult};
use crate::model::ScoreModel;

/// Supported notation formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    Json,
    StaffXml,
    TabletextAbc,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Json, Format::StaffXml, Format::TabletextAbc];

    /// Pick a format from a file extension (without the dot).
    /// `.mxl` archives are StaffXML.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "musicxml" | "xml" | "mxl" => Some(Format::StaffXml),
            "abc" => Some(Format::TabletextAbc),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::StaffXml => "musicxml",
            Format::TabletextAbc => "abc",
        }
    }

    /// The codec implementing this format.
    pub fn codec(self) -> &'static dyn FormatCodec {
        match self {
            Format::Json => &json::JsonCodec,
            Format::StaffXml => &musicxml::StaffXmlCodec,
            Format::TabletextAbc => &abc::TabletextAbcCodec,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "musicxml" | "staffxml" | "staff-xml" | "xml" => Ok(Format::StaffXml),
            "abc" | "tabletextabc" | "tabletext-abc" => Ok(Format::TabletextAbc),
            other => Err(format!("unknown format '{other}'")),
        }
    }
}

/// A successfully parsed score plus any notes that were skipped on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub score: ScoreModel,
    pub warnings: Vec<ParseWarning>,
}

impl ParseOutcome {
    pub fn clean(score: ScoreModel) -> Self {
        Self {
            score,
            warnings: Vec::new(),
        }
    }
}

/// A text encoding of [`ScoreModel`].
pub trait FormatCodec: Send + Sync {
    fn format(&self) -> Format;

    fn parse(&self, text: &str) -> ShakuResult<ParseOutcome>;

    fn serialize(&self, score: &ScoreModel) -> ShakuResult<String>;
}
