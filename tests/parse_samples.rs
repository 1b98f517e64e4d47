//! Integration tests — parse the sample files in the sheetmusic/ directory.

use pretty_assertions::assert_eq;
use shakulib::{
    parse, parse_bytes, parse_file, Alteration, Duration, ErrorKind, Format, ParseError,
    ParseOutcome, Pitch, PitchStep, Register, ScoreModel, ShakuError,
};
use std::io::{Cursor, Write};
use std::path::PathBuf;

/// Get the path to the sheetmusic directory.
fn sheetmusic_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("sheetmusic")
}

fn read_sample(name: &str) -> String {
    std::fs::read_to_string(sheetmusic_dir().join(name))
        .unwrap_or_else(|e| panic!("failed to read {name}: {e}"))
}

fn assert_choshi(score: &ScoreModel) {
    assert_eq!(score.title(), "Choshi");
    assert_eq!(score.composer(), Some("Traditional"));
    assert_eq!(score.tempo(), Some("60"));
    assert_eq!(score.key(), Some("D"));

    let notes = score.notes();
    assert_eq!(notes.len(), 9);

    let otsu = |s| Some(Pitch::new(s, Register::Otsu));
    let kan = |s| Some(Pitch::new(s, Register::Kan));
    let pitches: Vec<Option<Pitch>> = notes.iter().map(|n| n.pitch).collect();
    assert_eq!(
        pitches,
        [
            otsu(PitchStep::Ro),
            otsu(PitchStep::Tsu),
            otsu(PitchStep::Re),
            otsu(PitchStep::Chi),
            otsu(PitchStep::Ri),
            None,
            kan(PitchStep::Ro),
            otsu(PitchStep::Hi),
            kan(PitchStep::Chi),
        ]
    );

    assert_eq!(notes[2].duration, Duration::HALF);
    assert_eq!(notes[3].duration, Duration::EIGHTH);
    assert!(notes[3].dotted);
    assert_eq!(notes[4].duration, Duration::SIXTEENTH);
    assert!(notes[5].rest);
    assert_eq!(notes[7].alteration, Alteration::Half);
    assert_eq!(notes[8].duration, Duration::WHOLE);
}

// ─── Native JSON ────────────────────────────────────────────────────

#[test]
fn parse_choshi_json() {
    let outcome = parse_file(sheetmusic_dir().join("choshi.json")).expect("choshi.json");
    assert!(outcome.warnings.is_empty());
    assert_choshi(&outcome.score);
}

// ─── Uncompressed MusicXML (.musicxml) ──────────────────────────────

#[test]
fn parse_choshi_musicxml() {
    let outcome = parse_file(sheetmusic_dir().join("choshi.musicxml")).expect("choshi.musicxml");
    assert_choshi(&outcome.score);

    // A3 is below the instrument: skipped with a warning, not fatal.
    assert_eq!(outcome.warnings.len(), 1);
    let warning = &outcome.warnings[0];
    assert_eq!(warning.note_index, 9);
    assert_eq!(warning.token, "A3");
}

// ─── Compressed MusicXML (.mxl) ─────────────────────────────────────

fn build_mxl(xml: &str, with_container: bool) -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    if with_container {
        zip.start_file("META-INF/container.xml", options).unwrap();
        zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8"?>
<container>
  <rootfiles>
    <rootfile full-path="score/choshi.xml" media-type="application/vnd.recordare.musicxml+xml"/>
  </rootfiles>
</container>"#,
        )
        .unwrap();
    }
    zip.start_file("score/choshi.xml", options).unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

#[test]
fn mxl_matches_plain_musicxml() {
    let xml = read_sample("choshi.musicxml");
    let plain = parse(&xml, Format::StaffXml).unwrap();

    let archive = build_mxl(&xml, true);
    assert!(shakulib::is_mxl(&archive));
    let packed = parse_bytes(&archive, Format::StaffXml).unwrap();
    assert_eq!(packed, plain);
}

#[test]
fn mxl_without_container_uses_first_xml_entry() {
    let xml = read_sample("choshi.musicxml");
    let archive = build_mxl(&xml, false);
    let outcome = shakulib::parse_mxl(&archive).unwrap();
    assert_choshi(&outcome.score);
}

#[test]
fn corrupt_mxl_is_an_archive_error() {
    let err = parse_bytes(b"PK\x03\x04garbage", Format::StaffXml).unwrap_err();
    assert!(matches!(err, ShakuError::Parse(ParseError::Archive(_))));
}

// ─── Tablature (.abc) ───────────────────────────────────────────────

#[test]
fn parse_choshi_abc() {
    let outcome = parse_file(sheetmusic_dir().join("choshi.abc")).expect("choshi.abc");
    assert_choshi(&outcome.score);
}

#[test]
fn unmapped_pitch_fails_abc_but_not_musicxml() {
    let abc = "T:Low\nK:none\nD A, F\n";
    let err = parse(abc, Format::TabletextAbc).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Mapping);
    assert_eq!(err.note_index(), Some(1));
    match err {
        ShakuError::Parse(ParseError::Mapping { token, .. }) => assert_eq!(token, "A,"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn all_three_formats_agree() {
    let json = parse_file(sheetmusic_dir().join("choshi.json")).unwrap().score;
    let xml = parse_file(sheetmusic_dir().join("choshi.musicxml")).unwrap().score;
    let abc = parse_file(sheetmusic_dir().join("choshi.abc")).unwrap().score;
    assert_eq!(json, xml);
    assert_eq!(json, abc);
}

// ─── Byte handling ──────────────────────────────────────────────────

#[test]
fn byte_order_mark_is_ignored() {
    let mut data = "\u{feff}".as_bytes().to_vec();
    data.extend_from_slice(read_sample("choshi.json").as_bytes());
    let ParseOutcome { score, .. } = parse_bytes(&data, Format::Json).unwrap();
    assert_choshi(&score);
}

#[test]
fn invalid_utf8_is_an_encoding_error() {
    let err = parse_bytes(&[0x54, 0x3a, 0xff, 0xfe], Format::TabletextAbc).unwrap_err();
    assert!(matches!(err, ShakuError::Parse(ParseError::Encoding(_))));
}

#[test]
fn detect_format_from_content() {
    assert_eq!(shakulib::detect_format(b"  {\"title\":1}"), Format::Json);
    assert_eq!(shakulib::detect_format(b"<?xml"), Format::StaffXml);
    assert_eq!(shakulib::detect_format(b"X:1\nK:D"), Format::TabletextAbc);
}

#[test]
fn missing_file_is_io_error() {
    let err = parse_file(sheetmusic_dir().join("missing.abc")).unwrap_err();
    assert!(matches!(err, ShakuError::Parse(ParseError::Io(_))));
}
