//! MusicXML codec — reads and writes `score-partwise` documents.
//!
//! Import is best-effort: a MusicXML file may contain material the flute
//! cannot play, so unmappable pitches are skipped and reported as
//! [`ParseWarning`]s instead of failing the whole parse. Only the first part
//! is read, and chord and grace notes are ignored.

use num_rational::Ratio;
use roxmltree::{Document, Node};

use super::xml_writer::XmlWriter;
use super::{Format, FormatCodec, ParseOutcome};
use crate::error::{ParseError, ParseWarning, SerializeError, ShakuResult};
use crate::model::*;
use crate::pitch_table::{lookup_by_fingering, lookup_by_western, Accidental, Letter, WesternSpelling};

/// Divisions per quarter note when a part declares none (2 ticks = one quarter).
const DEFAULT_DIVISIONS: u32 = 2;

const PART_ID: &str = "P1";
const PART_NAME: &str = "Shakuhachi";
const SOFTWARE: &str = "shakulib";
const DOCTYPE: &str = r#"<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">"#;

const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_KEYS: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];

pub struct StaffXmlCodec;

impl FormatCodec for StaffXmlCodec {
    fn format(&self) -> Format {
        Format::StaffXml
    }

    fn parse(&self, text: &str) -> ShakuResult<ParseOutcome> {
        parse_musicxml(text)
    }

    fn serialize(&self, score: &ScoreModel) -> ShakuResult<String> {
        serialize_musicxml(score)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parsing
// ═══════════════════════════════════════════════════════════════════════

/// Parse a MusicXML string into a score.
pub fn parse_musicxml(xml: &str) -> ShakuResult<ParseOutcome> {
    // MusicXML files include a DOCTYPE declaration, so we must allow DTDs
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| ParseError::Xml(e.to_string()))?;
    let root = doc.root_element();

    if root.tag_name().name() != "score-partwise" {
        return Err(ParseError::structural(
            Format::StaffXml,
            format!(
                "unsupported root element '{}'; only 'score-partwise' is supported",
                root.tag_name().name()
            ),
        )
        .into());
    }

    let mut meta = Metadata::default();
    let mut first_part = None;

    for child in root.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "work" => parse_work(&child, &mut meta),
            "movement-title" => meta.movement_title = text_of(&child),
            "identification" => parse_identification(&child, &mut meta),
            "credit" => parse_credit(&child, &mut meta),
            "part" => {
                if first_part.is_none() {
                    first_part = Some(child);
                }
            }
            _ => {}
        }
    }

    let part = first_part
        .ok_or_else(|| ParseError::structural(Format::StaffXml, "document has no <part>"))?;

    let mut reader = PartReader::new();
    for measure in part
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "measure")
    {
        reader.read_measure(&measure);
    }

    if reader.notes.is_empty() {
        return Err(ParseError::structural(
            Format::StaffXml,
            "no playable notes in the first part",
        )
        .into());
    }

    let header = ScoreHeader {
        title: meta.title(),
        composer: meta.composer(),
        tempo: reader.tempo.or(reader.tempo_words),
        key: reader.key,
    };
    let score = ScoreModel::new(header, reader.notes)?;
    log::debug!(
        "musicxml: parsed '{}' with {} notes, {} skipped",
        score.title(),
        score.notes().len(),
        reader.warnings.len()
    );

    Ok(ParseOutcome {
        score,
        warnings: reader.warnings,
    })
}

// ─── Header metadata ─────────────────────────────────────────────────

#[derive(Default)]
struct Metadata {
    credit_title: Option<String>,
    work_title: Option<String>,
    movement_title: Option<String>,
    credit_composer: Option<String>,
    creator_composer: Option<String>,
}

impl Metadata {
    /// `<credit type="title">` takes priority over `<work-title>`,
    /// which takes priority over `<movement-title>`.
    fn title(&self) -> Option<String> {
        self.credit_title
            .clone()
            .or_else(|| self.work_title.clone())
            .or_else(|| self.movement_title.clone())
    }

    fn composer(&self) -> Option<String> {
        self.credit_composer
            .clone()
            .or_else(|| self.creator_composer.clone())
    }
}

fn parse_work(node: &Node, meta: &mut Metadata) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "work-title" {
            meta.work_title = text_of(&child);
        }
    }
}

fn parse_identification(node: &Node, meta: &mut Metadata) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "creator" && child.attribute("type") == Some("composer") {
            meta.creator_composer = text_of(&child);
        }
    }
}

fn parse_credit(node: &Node, meta: &mut Metadata) {
    let mut credit_type = String::new();
    let mut credit_text = String::new();

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "credit-type" => {
                credit_type = child.text().unwrap_or("").trim().to_string();
            }
            "credit-words" => {
                let text = child.text().unwrap_or("").trim();
                if !text.is_empty() {
                    if !credit_text.is_empty() {
                        credit_text.push(' ');
                    }
                    credit_text.push_str(text);
                }
            }
            _ => {}
        }
    }

    if credit_text.is_empty() {
        return;
    }
    match credit_type.as_str() {
        "title" => meta.credit_title = Some(credit_text),
        "composer" => meta.credit_composer = Some(credit_text),
        _ => {}
    }
}

// ─── Part ────────────────────────────────────────────────────────────

/// Running state while walking the measures of one part.
struct PartReader {
    divisions: u32,
    notes: Vec<ScoreNote>,
    warnings: Vec<ParseWarning>,
    /// Position of the next `<note>` element in the part.
    source_index: usize,
    tempo: Option<String>,
    tempo_words: Option<String>,
    key: Option<String>,
}

impl PartReader {
    fn new() -> Self {
        Self {
            divisions: DEFAULT_DIVISIONS,
            notes: Vec::new(),
            warnings: Vec::new(),
            source_index: 0,
            tempo: None,
            tempo_words: None,
            key: None,
        }
    }

    fn read_measure(&mut self, node: &Node) {
        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "attributes" => self.read_attributes(&child),
                "direction" => self.read_direction(&child),
                "sound" => {
                    // <sound> can appear directly in <measure> (not inside <direction>)
                    if self.tempo.is_none() {
                        self.tempo = child.attribute("tempo").and_then(format_tempo);
                    }
                }
                "note" => self.read_note(&child),
                _ => {}
            }
        }
    }

    fn read_attributes(&mut self, node: &Node) {
        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "divisions" => {
                    match parse_f64(&child) {
                        Some(d) if d >= 1.0 && d.fract() == 0.0 => self.divisions = d as u32,
                        _ => log::warn!("musicxml: ignoring invalid <divisions>"),
                    }
                }
                "key" => {
                    if self.key.is_none() {
                        self.key = parse_key(&child);
                    }
                }
                _ => {}
            }
        }
    }

    fn read_direction(&mut self, node: &Node) {
        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "direction-type" => {
                    for dt_child in child.children().filter(|n| n.is_element()) {
                        match dt_child.tag_name().name() {
                            "metronome" => {
                                if self.tempo.is_none() {
                                    self.tempo = dt_child
                                        .children()
                                        .find(|n| n.tag_name().name() == "per-minute")
                                        .and_then(|n| n.text())
                                        .and_then(format_tempo);
                                }
                            }
                            "words" => {
                                if self.tempo_words.is_none() {
                                    self.tempo_words = text_of(&dt_child);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                "sound" => {
                    if self.tempo.is_none() {
                        self.tempo = child.attribute("tempo").and_then(format_tempo);
                    }
                }
                _ => {}
            }
        }
    }

    fn read_note(&mut self, node: &Node) {
        let index = self.source_index;
        self.source_index += 1;

        let mut raw = RawNote::default();
        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "pitch" => raw.pitch = Some(parse_pitch(&child)),
                "unpitched" => raw.unpitched = true,
                "rest" => raw.rest = true,
                "chord" => raw.chord = true,
                "grace" => raw.grace = true,
                "duration" => raw.ticks = parse_f64(&child),
                "type" => raw.note_type = text_of(&child),
                "dot" => raw.dot = true,
                _ => {}
            }
        }

        if raw.chord || raw.grace {
            log::debug!("musicxml: skipping chord/grace note {index}");
            return;
        }

        let duration = raw
            .note_type
            .as_deref()
            .and_then(duration_from_type)
            .unwrap_or_else(|| duration_from_ticks(raw.ticks.unwrap_or(0.0), self.divisions));

        if raw.rest {
            let mut note = ScoreNote::rest(duration);
            note.dotted = raw.dot;
            self.notes.push(note);
            return;
        }

        let resolved = match raw.pitch {
            Some(ref pitch) if !raw.unpitched => resolve_pitch(pitch),
            _ => Err(("?".to_string(), "note has no pitch".to_string())),
        };

        match resolved {
            Ok((pitch, alteration)) => {
                let mut note = ScoreNote::note(pitch, duration).with_alteration(alteration);
                note.dotted = raw.dot;
                self.notes.push(note);
            }
            Err((token, message)) => {
                log::warn!("musicxml: skipping note {index} ({token}): {message}");
                self.warnings.push(ParseWarning {
                    note_index: index,
                    token,
                    message,
                });
            }
        }
    }
}

#[derive(Default)]
struct RawNote {
    pitch: Option<RawPitch>,
    unpitched: bool,
    rest: bool,
    chord: bool,
    grace: bool,
    ticks: Option<f64>,
    note_type: Option<String>,
    dot: bool,
}

struct RawPitch {
    step: String,
    alter: f64,
    octave: Option<i32>,
}

fn parse_pitch(node: &Node) -> RawPitch {
    let mut pitch = RawPitch {
        step: String::new(),
        alter: 0.0,
        octave: None,
    };
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "step" => pitch.step = child.text().unwrap_or("").trim().to_string(),
            "octave" => pitch.octave = parse_i32(&child),
            "alter" => pitch.alter = parse_f64(&child).unwrap_or(0.0),
            _ => {}
        }
    }
    pitch
}

/// Map a written pitch to a fingering, or explain why it cannot be played.
fn resolve_pitch(raw: &RawPitch) -> Result<(Pitch, Alteration), (String, String)> {
    let mut chars = raw.step.chars();
    let letter = match (chars.next().and_then(Letter::from_char), chars.next()) {
        (Some(l), None) => l,
        _ => return Err((raw.step.clone(), "invalid pitch step".to_string())),
    };
    let Some(octave) = raw.octave else {
        return Err((raw.step.clone(), "pitch has no octave".to_string()));
    };
    let Some(accidental) = Accidental::from_alter(raw.alter) else {
        return Err((
            format!("{}{}", raw.step, octave),
            format!("unsupported alteration {}", raw.alter),
        ));
    };
    let spelling = WesternSpelling::new(letter, accidental, octave);
    lookup_by_western(letter, accidental, octave)
        .ok_or_else(|| (spelling.to_string(), "outside the instrument's range".to_string()))
}

fn duration_from_type(note_type: &str) -> Option<Duration> {
    match note_type {
        "breve" => Some(Duration::from_integer(8)),
        "whole" => Some(Duration::WHOLE),
        "half" => Some(Duration::HALF),
        "quarter" => Some(Duration::QUARTER),
        "eighth" => Some(Duration::EIGHTH),
        "16th" => Some(Duration::SIXTEENTH),
        "32nd" => Duration::new(1, 8),
        "64th" => Duration::new(1, 16),
        _ => None,
    }
}

/// Coarse classification used when a note has no `<type>`. Ticks are first
/// rescaled to [`DEFAULT_DIVISIONS`] per quarter; 4 or more is a whole, 2 or
/// more a half, anything shorter a quarter.
fn duration_from_ticks(ticks: f64, divisions: u32) -> Duration {
    let scaled = ticks * f64::from(DEFAULT_DIVISIONS) / f64::from(divisions);
    if scaled >= 4.0 {
        Duration::WHOLE
    } else if scaled >= 2.0 {
        Duration::HALF
    } else {
        Duration::QUARTER
    }
}

fn parse_key(node: &Node) -> Option<String> {
    let mut fifths = None;
    let mut mode = None;
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "fifths" => fifths = parse_i32(&child),
            "mode" => mode = text_of(&child),
            _ => {}
        }
    }
    key_name(fifths?, mode.as_deref())
}

fn key_name(fifths: i32, mode: Option<&str>) -> Option<String> {
    let idx = usize::try_from(fifths + 7).ok().filter(|&i| i < MAJOR_KEYS.len())?;
    if mode == Some("minor") {
        Some(format!("{}m", MINOR_KEYS[idx]))
    } else {
        Some(MAJOR_KEYS[idx].to_string())
    }
}

/// Parse key names like "D", "Dm", "D minor", "F# major" into
/// `(fifths, is_minor)`.
fn key_fifths(key: &str) -> Option<(i32, bool)> {
    let key = key.trim();
    let (tonic, minor) = if let Some(t) = key.strip_suffix(" minor") {
        (t, true)
    } else if let Some(t) = key.strip_suffix(" major") {
        (t, false)
    } else if let Some(t) = key.strip_suffix("min") {
        (t, true)
    } else if let Some(t) = key.strip_suffix('m') {
        (t, true)
    } else {
        (key, false)
    };
    let tonic = tonic.trim();
    let table = if minor { &MINOR_KEYS } else { &MAJOR_KEYS };
    let idx = table.iter().position(|k| k.eq_ignore_ascii_case(tonic))?;
    Some((idx as i32 - 7, minor))
}

fn format_tempo(raw: &str) -> Option<String> {
    let bpm = raw.trim().parse::<f64>().ok().filter(|v| *v > 0.0)?;
    Some(format_number(bpm))
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Serialization
// ═══════════════════════════════════════════════════════════════════════

/// Write a score as a single-part MusicXML 3.1 document.
///
/// Chu-meri has no twelve-tone spelling and is written as meri.
pub fn serialize_musicxml(score: &ScoreModel) -> ShakuResult<String> {
    let divisions = divisions_for(score.notes())?;
    let mut w = XmlWriter::new();

    w.raw_line(r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#);
    w.raw_line(DOCTYPE);
    w.open("score-partwise", &[("version", "3.1")]);

    w.open("work", &[]);
    w.text("work-title", &[], score.title());
    w.close();

    w.open("identification", &[]);
    if let Some(composer) = score.composer() {
        w.text("creator", &[("type", "composer")], composer);
    }
    w.open("encoding", &[]);
    w.text("software", &[], SOFTWARE);
    w.close();
    w.close();

    w.open("part-list", &[]);
    w.open("score-part", &[("id", PART_ID)]);
    w.text("part-name", &[], PART_NAME);
    w.close();
    w.close();

    w.open("part", &[("id", PART_ID)]);
    w.open("measure", &[("number", "1")]);

    w.open("attributes", &[]);
    w.text("divisions", &[], &divisions.to_string());
    match score.key().and_then(key_fifths) {
        Some((fifths, minor)) => {
            w.open("key", &[]);
            w.text("fifths", &[], &fifths.to_string());
            w.text("mode", &[], if minor { "minor" } else { "major" });
            w.close();
        }
        None => {
            if let Some(key) = score.key() {
                log::debug!("musicxml: key '{key}' has no key signature, dropping it");
            }
        }
    }
    w.open("clef", &[]);
    w.text("sign", &[], "G");
    w.text("line", &[], "2");
    w.close();
    w.close();

    if let Some(tempo) = score.tempo() {
        write_tempo(&mut w, tempo);
    }

    for (i, note) in score.notes().iter().enumerate() {
        write_note(&mut w, i, note, divisions)?;
    }

    Ok(w.build())
}

fn write_tempo(w: &mut XmlWriter, tempo: &str) {
    w.open("direction", &[("placement", "above")]);
    w.open("direction-type", &[]);
    match format_tempo(tempo) {
        Some(bpm) => {
            w.open("metronome", &[]);
            w.text("beat-unit", &[], "quarter");
            w.text("per-minute", &[], &bpm);
            w.close();
            w.close();
            w.empty("sound", &[("tempo", bpm.as_str())]);
        }
        None => {
            w.text("words", &[], tempo);
            w.close();
        }
    }
    w.close();
}

fn write_note(w: &mut XmlWriter, index: usize, note: &ScoreNote, divisions: u32) -> ShakuResult<()> {
    let spelling = match note.sounding_pitch() {
        Some(pitch) => {
            let level = match note.alteration {
                Alteration::Quarter => Alteration::Half,
                other => other,
            };
            let spelling = lookup_by_fingering(pitch, level).ok_or_else(|| {
                SerializeError::Unspellable {
                    format: Format::StaffXml,
                    note_index: index,
                    message: format!("no Western spelling for {} ({:?})", pitch.step, level),
                }
            })?;
            Some(spelling)
        }
        None => None,
    };

    w.open("note", &[]);
    match spelling {
        Some(s) => {
            w.open("pitch", &[]);
            w.text("step", &[], &s.letter.as_char().to_string());
            if s.accidental != Accidental::Natural {
                w.text("alter", &[], &format_number(s.accidental.alter()));
            }
            w.text("octave", &[], &s.octave.to_string());
            w.close();
        }
        None => w.empty("rest", &[]),
    }
    w.text("duration", &[], &ticks_for(index, note, divisions)?.to_string());
    w.text("voice", &[], "1");
    w.text("type", &[], note_type_name(note.duration));
    if note.dotted {
        w.empty("dot", &[]);
    }
    if let Some(acc) = spelling.and_then(|s| accidental_name(s.accidental)) {
        w.text("accidental", &[], acc);
    }
    w.close();
    Ok(())
}

fn accidental_name(acc: Accidental) -> Option<&'static str> {
    match acc {
        Accidental::DoubleFlat => Some("flat-flat"),
        Accidental::Flat => Some("flat"),
        Accidental::QuarterFlat => Some("quarter-flat"),
        Accidental::Natural => None,
        Accidental::Sharp => Some("sharp"),
        Accidental::DoubleSharp => Some("double-sharp"),
    }
}

/// Note-type vocabulary by magnitude.
fn note_type_name(duration: Duration) -> &'static str {
    let d = duration.ratio();
    if d >= Ratio::from_integer(4) {
        "whole"
    } else if d >= Ratio::from_integer(2) {
        "half"
    } else if d >= Ratio::from_integer(1) {
        "quarter"
    } else if d >= Ratio::new(1, 2) {
        "eighth"
    } else {
        "16th"
    }
}

/// Sounding length as `(numer, denom)` quarters, dot included.
fn sounding_length(note: &ScoreNote) -> (u64, u64) {
    let ratio = note.duration.ratio();
    let (numer, denom) = (u64::from(*ratio.numer()), u64::from(*ratio.denom()));
    if note.dotted {
        let g = gcd(numer * 3, denom * 2);
        (numer * 3 / g, denom * 2 / g)
    } else {
        (numer, denom)
    }
}

fn unrepresentable(index: usize, what: &str) -> SerializeError {
    SerializeError::Unspellable {
        format: Format::StaffXml,
        note_index: index,
        message: format!("{what} does not fit a 32-bit <duration>"),
    }
}

/// Smallest divisions value that gives every note an integral tick count.
fn divisions_for(notes: &[ScoreNote]) -> Result<u32, SerializeError> {
    let mut divisions = DEFAULT_DIVISIONS;
    for (i, note) in notes.iter().enumerate() {
        let (_, denom) = sounding_length(note);
        divisions = (u64::from(divisions) / gcd(u64::from(divisions), denom))
            .checked_mul(denom)
            .and_then(|d| u32::try_from(d).ok())
            .ok_or_else(|| unrepresentable(i, "divisions"))?;
    }
    Ok(divisions)
}

fn ticks_for(index: usize, note: &ScoreNote, divisions: u32) -> Result<u32, SerializeError> {
    let (numer, denom) = sounding_length(note);
    numer
        .checked_mul(u64::from(divisions) / denom)
        .and_then(|t| u32::try_from(t).ok())
        .ok_or_else(|| unrepresentable(index, "note length"))
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn text_of(node: &Node) -> Option<String> {
    node.text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn parse_i32(node: &Node) -> Option<i32> {
    node.text()?.trim().parse().ok()
}

fn parse_f64(node: &Node) -> Option<f64> {
    node.text()?.trim().parse().ok()
}
