//! Integration tests — conversions and round trips between the three formats.

use pretty_assertions::assert_eq;
use shakulib::{
    convert, parse, serialize, Alteration, Duration, ErrorKind, Format, Pitch, PitchStep,
    Register, ScoreHeader, ScoreModel, ScoreNote, SerializeError, ShakuError,
};
use std::path::PathBuf;

fn sample(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("sheetmusic").join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {name}: {e}"))
}

/// A score touching every register, alteration level and common duration.
fn varied_score() -> ScoreModel {
    let mut notes = Vec::new();
    let durations = [
        Duration::WHOLE,
        Duration::HALF,
        Duration::QUARTER,
        Duration::EIGHTH,
        Duration::SIXTEENTH,
    ];
    let alterations = [
        Alteration::None,
        Alteration::Half,
        Alteration::Quarter,
        Alteration::Whole,
    ];
    for (i, register) in Register::ALL.into_iter().enumerate() {
        for (j, step) in PitchStep::ALL.into_iter().enumerate() {
            let duration = durations[(i + j) % durations.len()];
            let alteration = alterations[(i * 7 + j) % alterations.len()];
            let mut note =
                ScoreNote::note(Pitch::new(step, register), duration).with_alteration(alteration);
            note.dotted = j % 3 == 0;
            notes.push(note);
        }
    }
    notes.push(ScoreNote::rest(Duration::QUARTER).with_dot());
    notes.push(ScoreNote::rest(Duration::new(3, 4).unwrap()));

    ScoreModel::new(
        ScoreHeader {
            title: Some("Shika no Tōne & <friends>".into()),
            composer: Some("Anonymous \"komusō\"".into()),
            tempo: Some("72".into()),
            key: Some("D".into()),
        },
        notes,
    )
    .unwrap()
}

fn round_trip(score: &ScoreModel, format: Format) -> ScoreModel {
    let text = serialize(score, format).unwrap_or_else(|e| panic!("{format} serialize: {e}"));
    let outcome = parse(&text, format).unwrap_or_else(|e| panic!("{format} parse: {e}\n{text}"));
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    outcome.score
}

// ─── Round trips ────────────────────────────────────────────────────

#[test]
fn json_round_trip_is_exact() {
    let score = varied_score();
    assert_eq!(round_trip(&score, Format::Json), score);
}

#[test]
fn abc_round_trip_keeps_every_note_field() {
    let score = varied_score();
    let back = round_trip(&score, Format::TabletextAbc);
    assert_eq!(back.title(), score.title());
    assert_eq!(back.composer(), score.composer());
    assert_eq!(back.notes(), score.notes());
}

#[test]
fn abc_round_trip_keeps_percent_in_header() {
    let ro = Pitch::new(PitchStep::Ro, Register::Otsu);
    let score = ScoreModel::new(
        ScoreHeader {
            title: Some("100% Ro".into()),
            composer: Some("a % b".into()),
            tempo: Some("60%".into()),
            key: None,
        },
        vec![ScoreNote::note(ro, Duration::QUARTER)],
    )
    .unwrap();
    assert_eq!(round_trip(&score, Format::TabletextAbc), score);
}

#[test]
fn abc_colon_bars_keep_every_note() {
    let text = "T:x\nK:none\nD E F\nG:| A B\n|: c d :|\n";
    let score = parse(text, Format::TabletextAbc).unwrap().score;
    assert_eq!(score.notes().len(), 8);
    let json = convert(text, Format::TabletextAbc, Format::Json).unwrap();
    assert_eq!(parse(&json, Format::Json).unwrap().score, score);
}

#[test]
fn abc_round_trip_keeps_fine_lengths() {
    let ro = Pitch::new(PitchStep::Ro, Register::Otsu);
    let notes = vec![
        ScoreNote::note(ro, Duration::new(1, 65521).unwrap()),
        ScoreNote::note(ro, Duration::new(65519, 3).unwrap()).with_dot(),
        ScoreNote::rest(Duration::new(7, 1024).unwrap()),
    ];
    let score = ScoreModel::new(ScoreHeader::default(), notes).unwrap();
    assert_eq!(round_trip(&score, Format::TabletextAbc), score);
}

#[test]
fn musicxml_rejects_unrepresentable_divisions() {
    let ro = Pitch::new(PitchStep::Ro, Register::Otsu);
    let notes = vec![
        ScoreNote::note(ro, Duration::new(1, 65521).unwrap()),
        ScoreNote::note(ro, Duration::new(1, 65519).unwrap()),
    ];
    let score = ScoreModel::new(ScoreHeader::default(), notes).unwrap();
    let err = serialize(&score, Format::StaffXml).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Mapping);
    assert_eq!(err.note_index(), Some(1));
}

#[test]
fn abc_refuses_key_that_reads_back_as_none() {
    let score = ScoreModel::new(
        ScoreHeader {
            key: Some("none".into()),
            ..Default::default()
        },
        vec![ScoreNote::rest(Duration::QUARTER)],
    )
    .unwrap();
    let err = serialize(&score, Format::TabletextAbc).unwrap_err();
    assert!(matches!(err, ShakuError::Serialize(SerializeError::Header { .. })));
    // Other formats keep it.
    assert_eq!(round_trip(&score, Format::Json).key(), Some("none"));
}

#[test]
fn musicxml_round_trip_keeps_direction() {
    let score = varied_score();
    let back = round_trip(&score, Format::StaffXml);
    assert_eq!(back.title(), score.title());
    assert_eq!(back.composer(), score.composer());
    assert_eq!(back.tempo(), Some("72"));
    assert_eq!(back.key(), Some("D"));
    assert_eq!(back.notes().len(), score.notes().len());

    for (i, (a, b)) in score.notes().iter().zip(back.notes()).enumerate() {
        assert_eq!(a.pitch, b.pitch, "pitch of note {i}");
        assert_eq!(a.rest, b.rest, "rest of note {i}");
        assert_eq!(a.dotted, b.dotted, "dot of note {i}");
        // Chu-meri is written as meri.
        let expected = match a.alteration {
            Alteration::Quarter => Alteration::Half,
            other => other,
        };
        assert_eq!(b.alteration, expected, "alteration of note {i}");
    }

    // Durations survive as note-type classes.
    assert_eq!(back.notes()[0].duration, Duration::WHOLE);
    assert_eq!(back.notes()[3].duration, Duration::EIGHTH);
    assert_eq!(back.notes()[4].duration, Duration::SIXTEENTH);
}

// ─── convert ────────────────────────────────────────────────────────

#[test]
fn convert_to_same_format_is_identity() {
    let text = "T:anything\nK:none\nD";
    assert_eq!(convert(text, Format::TabletextAbc, Format::TabletextAbc).unwrap(), text);
}

#[test]
fn convert_musicxml_to_abc() {
    let abc = convert(&sample("choshi.musicxml"), Format::StaffXml, Format::TabletextAbc).unwrap();
    assert_eq!(
        abc,
        "X:1\nT:Choshi\nC:Traditional\nQ:60\nL:1/4\nK:D\nD F G2 A/2. c/4 z d _E a4\n"
    );
}

#[test]
fn convert_abc_to_json_matches_sample() {
    let json = convert(&sample("choshi.abc"), Format::TabletextAbc, Format::Json).unwrap();
    let expected = parse(&sample("choshi.json"), Format::Json).unwrap().score;
    assert_eq!(parse(&json, Format::Json).unwrap().score, expected);
}

#[test]
fn musicxml_output_escapes_text() {
    let xml = serialize(&varied_score(), Format::StaffXml).unwrap();
    assert!(xml.contains("<work-title>Shika no Tōne &amp; &lt;friends&gt;</work-title>"));
    assert!(xml.contains("<creator type=\"composer\">Anonymous &quot;komusō&quot;</creator>"));
}

#[test]
fn convert_propagates_parse_errors() {
    let err = convert("T:x\nK:none\nD Q F\n", Format::TabletextAbc, Format::Json).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structural);
}

#[test]
fn format_names_and_extensions() {
    assert_eq!("musicxml".parse::<Format>(), Ok(Format::StaffXml));
    assert_eq!("ABC".parse::<Format>(), Ok(Format::TabletextAbc));
    assert!("midi".parse::<Format>().is_err());
    assert_eq!(Format::from_extension("MXL"), Some(Format::StaffXml));
    assert_eq!(Format::from_extension("abc"), Some(Format::TabletextAbc));
    assert_eq!(Format::from_extension("pdf"), None);
}
