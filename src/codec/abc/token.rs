//! Note token grammar and spelling.
//!
//! ```text
//! token    := accidental? letter octave* length? '.'?
//! accidental := '^^' | '^' | '=' | '__' | '_/' | '_'
//! letter   := [A-G] | [a-g] | 'z'
//! octave   := '\'' | ','
//! length   := digits | '/' digits | digits '/' digits
//! ```

use std::collections::HashMap;

use num_rational::Ratio;
use once_cell::sync::Lazy;

use crate::model::{Alteration, Pitch};
use crate::pitch_table::{lookup_by_western, Accidental, Letter};

/// Letter reserved for rests.
pub(super) const REST: char = 'z';
/// Suffix marking a dotted note.
pub(super) const DOT: char = '.';

/// Characters that separate tokens and carry no meaning (bar lines, repeats).
const SEPARATORS: [char; 3] = ['|', ':', ']'];

#[derive(Debug, Clone, PartialEq)]
pub(super) enum TokenKind {
    Pitched {
        letter: Letter,
        accidental: Accidental,
        octave: i32,
    },
    Rest,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct NoteToken {
    pub(super) text: String,
    pub(super) kind: TokenKind,
    /// Multiple of the unit note length.
    pub(super) length: Ratio<u32>,
    pub(super) dotted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct TokenError {
    pub(super) token: String,
    pub(super) message: String,
}

/// Whether `c` can open a note or rest token.
pub(super) fn is_note_letter(c: char) -> bool {
    c == REST || (c.is_ascii_alphabetic() && Letter::from_char(c).is_some())
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || SEPARATORS.contains(&c)
}

/// The whole whitespace/bar-delimited word starting at `start`, for messages.
fn word_at(chars: &[char], start: usize) -> String {
    chars[start..]
        .iter()
        .take_while(|c| !is_separator(**c))
        .collect()
}

fn error(chars: &[char], start: usize, message: impl Into<String>) -> TokenError {
    TokenError {
        token: word_at(chars, start),
        message: message.into(),
    }
}

/// Split one body line into note tokens.
pub(super) fn tokenize_line(line: &str) -> Result<Vec<NoteToken>, TokenError> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if is_separator(c) {
            pos += 1;
            continue;
        }
        if c == '[' {
            if chars.get(pos + 1) == Some(&'|') {
                pos += 2;
                continue;
            }
            return Err(error(&chars, pos, "chords and inline fields are not supported"));
        }
        let (token, next) = scan_note(&chars, pos)?;
        tokens.push(token);
        pos = next;
    }

    Ok(tokens)
}

fn scan_note(chars: &[char], start: usize) -> Result<(NoteToken, usize), TokenError> {
    let mut pos = start;

    let accidental = match (chars.get(pos), chars.get(pos + 1)) {
        (Some('^'), Some('^')) => Some((Accidental::DoubleSharp, 2)),
        (Some('^'), _) => Some((Accidental::Sharp, 1)),
        (Some('='), _) => Some((Accidental::Natural, 1)),
        (Some('_'), Some('_')) => Some((Accidental::DoubleFlat, 2)),
        (Some('_'), Some('/')) => Some((Accidental::QuarterFlat, 2)),
        (Some('_'), _) => Some((Accidental::Flat, 1)),
        _ => None,
    }
    .map(|(acc, width)| {
        pos += width;
        acc
    });

    let Some(&letter_char) = chars.get(pos) else {
        return Err(error(chars, start, "accidental without a note letter"));
    };
    pos += 1;

    let mut kind = if letter_char == REST {
        if accidental.is_some() {
            return Err(error(chars, start, "rests cannot carry accidentals"));
        }
        TokenKind::Rest
    } else {
        match Letter::from_char(letter_char) {
            Some(letter) if letter_char.is_ascii_alphabetic() => TokenKind::Pitched {
                letter,
                accidental: accidental.unwrap_or(Accidental::Natural),
                octave: if letter_char.is_ascii_uppercase() { 4 } else { 5 },
            },
            _ => {
                return Err(error(
                    chars,
                    start,
                    format!("unrecognized note letter '{letter_char}'"),
                ))
            }
        }
    };

    while let Some(&mark) = chars.get(pos) {
        let shift = match mark {
            '\'' => 1,
            ',' => -1,
            _ => break,
        };
        match kind {
            TokenKind::Pitched { ref mut octave, .. } => *octave += shift,
            TokenKind::Rest => {
                return Err(error(chars, start, "rests cannot carry octave marks"))
            }
        }
        pos += 1;
    }

    let (length, after_length) = scan_length(chars, start, pos)?;
    pos = after_length;

    let dotted = chars.get(pos) == Some(&DOT);
    if dotted {
        pos += 1;
    }

    let token = NoteToken {
        text: chars[start..pos].iter().collect(),
        kind,
        length,
        dotted,
    };
    Ok((token, pos))
}

fn scan_digits(chars: &[char], mut pos: usize) -> (String, usize) {
    let mut digits = String::new();
    while let Some(&c) = chars.get(pos) {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        pos += 1;
    }
    (digits, pos)
}

/// Duration suffix: `n`, `/n` or `n/m`; absent means one unit.
fn scan_length(
    chars: &[char],
    start: usize,
    pos: usize,
) -> Result<(Ratio<u32>, usize), TokenError> {
    let (numer_digits, mut pos) = scan_digits(chars, pos);

    let denom_digits = if chars.get(pos) == Some(&'/') {
        let (digits, next) = scan_digits(chars, pos + 1);
        if digits.is_empty() {
            return Err(error(chars, start, "duration '/' must be followed by a number"));
        }
        pos = next;
        Some(digits)
    } else {
        None
    };

    let parse = |digits: &str| {
        digits
            .parse::<u32>()
            .map_err(|_| error(chars, start, format!("duration '{digits}' is too large")))
    };
    let numer = if numer_digits.is_empty() {
        1
    } else {
        parse(&numer_digits)?
    };
    let denom = match denom_digits {
        Some(ref d) => parse(d)?,
        None => 1,
    };
    if numer == 0 || denom == 0 {
        return Err(error(chars, start, "duration must be greater than zero"));
    }

    Ok((Ratio::new(numer, denom), pos))
}

// ═══════════════════════════════════════════════════════════════════════
// Spelling
// ═══════════════════════════════════════════════════════════════════════

fn accidental_prefix(acc: Accidental) -> &'static str {
    match acc {
        Accidental::DoubleSharp => "^^",
        Accidental::Sharp => "^",
        Accidental::Natural => "",
        Accidental::QuarterFlat => "_/",
        Accidental::Flat => "_",
        Accidental::DoubleFlat => "__",
    }
}

/// Write a pitch as a token (without length).
pub(super) fn spell(letter: Letter, accidental: Accidental, octave: i32) -> String {
    let mut out = accidental_prefix(accidental).to_string();
    if octave >= 5 {
        out.push(letter.as_char().to_ascii_lowercase());
        for _ in 5..octave {
            out.push('\'');
        }
    } else {
        out.push(letter.as_char());
        for _ in octave..4 {
            out.push(',');
        }
    }
    out
}

/// Tie-break among tokens of equal length.
fn preference(acc: Accidental) -> usize {
    match acc {
        Accidental::Natural => 0,
        Accidental::Flat => 1,
        Accidental::QuarterFlat => 2,
        Accidental::Sharp => 3,
        Accidental::DoubleFlat => 4,
        Accidental::DoubleSharp => 5,
    }
}

const SPELLING_ACCIDENTALS: [Accidental; 6] = [
    Accidental::Natural,
    Accidental::Flat,
    Accidental::QuarterFlat,
    Accidental::Sharp,
    Accidental::DoubleFlat,
    Accidental::DoubleSharp,
];

/// Shortest token for each fingering, built once.
static TOKEN_BY_FINGERING: Lazy<HashMap<(Pitch, Alteration), String>> = Lazy::new(|| {
    let mut best: HashMap<(Pitch, Alteration), (usize, usize, String)> = HashMap::new();
    for octave in 3..=7 {
        for letter in Letter::ALL {
            for acc in SPELLING_ACCIDENTALS {
                let Some(key) = lookup_by_western(letter, acc, octave) else {
                    continue;
                };
                let token = spell(letter, acc, octave);
                let rank = (token.len(), preference(acc));
                let better = best
                    .get(&key)
                    .map_or(true, |(len, pref, _)| rank < (*len, *pref));
                if better {
                    best.insert(key, (rank.0, rank.1, token));
                }
            }
        }
    }
    best.into_iter().map(|(k, (_, _, t))| (k, t)).collect()
});

pub(super) fn token_for(pitch: Pitch, alteration: Alteration) -> Option<&'static str> {
    TOKEN_BY_FINGERING
        .get(&(pitch, alteration))
        .map(String::as_str)
}
