//! Western pitch spelling ↔ shakuhachi fingering.
//!
//! The instrument is a 1.8 shaku (D) flute. Each fingering has a natural
//! Western spelling in the base register (ro = D4 … ri = C5); alterations
//! lower it by a semitone (meri), a quarter tone (chu-meri) or a whole tone
//! (dai-meri). Three registers are playable, giving a range of C4 to C7.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::model::{Alteration, Pitch, PitchStep, Register};

/// Western note letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
        Letter::A,
        Letter::B,
    ];

    /// Semitones above C in the same octave.
    pub fn semitone(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    /// Case-insensitive.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            'E' => Some(Letter::E),
            'F' => Some(Letter::F),
            'G' => Some(Letter::G),
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        }
    }
}

/// Written accidental. `QuarterFlat` has no twelve-tone equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accidental {
    DoubleFlat,
    Flat,
    QuarterFlat,
    Natural,
    Sharp,
    DoubleSharp,
}

impl Accidental {
    /// Twelve-tone accidentals, in spelling preference order.
    const TWELVE_TONE: [Accidental; 5] = [
        Accidental::Natural,
        Accidental::Flat,
        Accidental::Sharp,
        Accidental::DoubleFlat,
        Accidental::DoubleSharp,
    ];

    /// Semitone offset, or `None` for the quarter-tone flat.
    pub fn semitones(self) -> Option<i32> {
        match self {
            Accidental::DoubleFlat => Some(-2),
            Accidental::Flat => Some(-1),
            Accidental::QuarterFlat => None,
            Accidental::Natural => Some(0),
            Accidental::Sharp => Some(1),
            Accidental::DoubleSharp => Some(2),
        }
    }

    /// The MusicXML `<alter>` value.
    pub fn alter(self) -> f64 {
        match self {
            Accidental::DoubleFlat => -2.0,
            Accidental::Flat => -1.0,
            Accidental::QuarterFlat => -0.5,
            Accidental::Natural => 0.0,
            Accidental::Sharp => 1.0,
            Accidental::DoubleSharp => 2.0,
        }
    }

    pub fn from_alter(alter: f64) -> Option<Self> {
        let halves = alter * 2.0;
        if halves.fract() != 0.0 {
            return None;
        }
        match halves as i32 {
            -4 => Some(Accidental::DoubleFlat),
            -2 => Some(Accidental::Flat),
            -1 => Some(Accidental::QuarterFlat),
            0 => Some(Accidental::Natural),
            2 => Some(Accidental::Sharp),
            4 => Some(Accidental::DoubleSharp),
            _ => None,
        }
    }

    /// Number of accidental glyphs the spelling needs.
    pub fn glyph_count(self) -> usize {
        match self {
            Accidental::Natural => 0,
            Accidental::Flat | Accidental::QuarterFlat | Accidental::Sharp => 1,
            Accidental::DoubleFlat | Accidental::DoubleSharp => 2,
        }
    }

    /// Tie-break rank among spellings of equal length: natural, flat, sharp.
    fn preference(self) -> usize {
        match self {
            Accidental::Natural => 0,
            Accidental::Flat | Accidental::DoubleFlat => 1,
            Accidental::QuarterFlat => 2,
            Accidental::Sharp | Accidental::DoubleSharp => 3,
        }
    }

    /// Lowering level this accidental denotes when written on a fingering's
    /// own letter.
    fn as_alteration(self) -> Option<Alteration> {
        match self {
            Accidental::Natural => Some(Alteration::None),
            Accidental::Flat => Some(Alteration::Half),
            Accidental::QuarterFlat => Some(Alteration::Quarter),
            Accidental::DoubleFlat => Some(Alteration::Whole),
            Accidental::Sharp | Accidental::DoubleSharp => None,
        }
    }
}

/// A written Western pitch (scientific octave numbering, middle C = C4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WesternSpelling {
    pub letter: Letter,
    pub accidental: Accidental,
    pub octave: i32,
}

impl WesternSpelling {
    pub fn new(letter: Letter, accidental: Accidental, octave: i32) -> Self {
        Self {
            letter,
            accidental,
            octave,
        }
    }

    /// Semitones above D4, or `None` for quarter-tone spellings.
    pub fn semitone_from_fundamental(&self) -> Option<i32> {
        let acc = self.accidental.semitones()?;
        Some((self.octave - 4) * 12 + self.letter.semitone() - 2 + acc)
    }
}

impl fmt::Display for WesternSpelling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let acc = match self.accidental {
            Accidental::DoubleFlat => "bb",
            Accidental::Flat => "b",
            Accidental::QuarterFlat => "d",
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::DoubleSharp => "##",
        };
        write!(f, "{}{}{}", self.letter.as_char(), acc, self.octave)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Fingering data
// ═══════════════════════════════════════════════════════════════════════

/// Natural Western letter of each fingering.
pub fn natural_letter(step: PitchStep) -> Letter {
    match step {
        PitchStep::Ro => Letter::D,
        PitchStep::Hi => Letter::E,
        PitchStep::Tsu => Letter::F,
        PitchStep::Re => Letter::G,
        PitchStep::Chi => Letter::A,
        PitchStep::U => Letter::B,
        PitchStep::Ri => Letter::C,
    }
}

/// Western octave of each fingering's natural spelling in the base register.
fn natural_octave(step: PitchStep) -> i32 {
    match step {
        PitchStep::Ri => 5,
        _ => 4,
    }
}

fn lowering_semitones(alteration: Alteration) -> Option<i32> {
    match alteration {
        Alteration::None => Some(0),
        Alteration::Half => Some(1),
        Alteration::Whole => Some(2),
        Alteration::Quarter => None,
    }
}

/// Every playable fingering in ascending order.
pub fn all_fingerings() -> impl Iterator<Item = Pitch> {
    Register::ALL
        .into_iter()
        .flat_map(|r| PitchStep::ALL.into_iter().map(move |s| Pitch::new(s, r)))
}

// ═══════════════════════════════════════════════════════════════════════
// Lookups
// ═══════════════════════════════════════════════════════════════════════

/// Map a written pitch to a fingering.
///
/// A spelling on a fingering's own letter (natural, flat, quarter-flat or
/// double-flat) selects that fingering directly. Anything else resolves by
/// sounding pitch, preferring an unaltered fingering over meri over dai-meri.
/// Pitches outside the three registers return `None`.
pub fn lookup_by_western(
    letter: Letter,
    accidental: Accidental,
    octave: i32,
) -> Option<(Pitch, Alteration)> {
    if let Some(alteration) = accidental.as_alteration() {
        for step in PitchStep::ALL {
            if natural_letter(step) != letter {
                continue;
            }
            let register = i64::from(octave - natural_octave(step));
            if let Some(register) = Register::from_index(register) {
                return Some((Pitch::new(step, register), alteration));
            }
        }
    }

    let target = WesternSpelling::new(letter, accidental, octave).semitone_from_fundamental()?;
    for alteration in [Alteration::None, Alteration::Half, Alteration::Whole] {
        let lowering = lowering_semitones(alteration)?;
        if let Some(pitch) = all_fingerings().find(|p| p.semitone() - lowering == target) {
            return Some((pitch, alteration));
        }
    }
    None
}

/// Every candidate spelling around the playable range.
fn candidate_spellings() -> impl Iterator<Item = WesternSpelling> {
    (3..=7).flat_map(|octave| {
        Letter::ALL.into_iter().flat_map(move |letter| {
            Accidental::TWELVE_TONE
                .into_iter()
                .map(move |acc| WesternSpelling::new(letter, acc, octave))
        })
    })
}

static WESTERN_BY_FINGERING: Lazy<HashMap<(Pitch, Alteration), WesternSpelling>> =
    Lazy::new(|| {
        let mut table: HashMap<(Pitch, Alteration), WesternSpelling> = HashMap::new();
        for spelling in candidate_spellings() {
            let Some(key) =
                lookup_by_western(spelling.letter, spelling.accidental, spelling.octave)
            else {
                continue;
            };
            let better = match table.get(&key) {
                None => true,
                Some(current) => spelling_rank(&spelling) < spelling_rank(current),
            };
            if better {
                table.insert(key, spelling);
            }
        }
        table
    });

fn spelling_rank(s: &WesternSpelling) -> (usize, usize) {
    (s.accidental.glyph_count(), s.accidental.preference())
}

/// Map a fingering back to its simplest Western spelling.
///
/// Only spellings that [`lookup_by_western`] resolves to the same fingering
/// are considered, so the two lookups round-trip. Quarter-tone alterations
/// have no twelve-tone spelling and return `None`.
pub fn lookup_by_fingering(pitch: Pitch, alteration: Alteration) -> Option<WesternSpelling> {
    WESTERN_BY_FINGERING.get(&(pitch, alteration)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(step: PitchStep, octave: Register) -> Pitch {
        Pitch::new(step, octave)
    }

    #[test]
    fn naturals_map_to_base_register() {
        assert_eq!(
            lookup_by_western(Letter::D, Accidental::Natural, 4),
            Some((p(PitchStep::Ro, Register::Otsu), Alteration::None))
        );
        assert_eq!(
            lookup_by_western(Letter::C, Accidental::Natural, 5),
            Some((p(PitchStep::Ri, Register::Otsu), Alteration::None))
        );
        assert_eq!(
            lookup_by_western(Letter::A, Accidental::Natural, 6),
            Some((p(PitchStep::Chi, Register::Daikan), Alteration::None))
        );
    }

    #[test]
    fn flats_on_own_letter_are_meri() {
        assert_eq!(
            lookup_by_western(Letter::F, Accidental::DoubleFlat, 4),
            Some((p(PitchStep::Tsu, Register::Otsu), Alteration::Whole))
        );
        assert_eq!(
            lookup_by_western(Letter::A, Accidental::QuarterFlat, 5),
            Some((p(PitchStep::Chi, Register::Kan), Alteration::Quarter))
        );
    }

    #[test]
    fn enharmonics_resolve_by_sound() {
        // D#4 sounds as E-flat: hi meri.
        assert_eq!(
            lookup_by_western(Letter::D, Accidental::Sharp, 4),
            Some((p(PitchStep::Hi, Register::Otsu), Alteration::Half))
        );
        // C4 is only reachable as ro dai-meri.
        assert_eq!(
            lookup_by_western(Letter::C, Accidental::Natural, 4),
            Some((p(PitchStep::Ro, Register::Otsu), Alteration::Whole))
        );
    }

    #[test]
    fn out_of_range_is_not_found() {
        assert_eq!(lookup_by_western(Letter::B, Accidental::Natural, 3), None);
        assert_eq!(lookup_by_western(Letter::C, Accidental::Sharp, 7), None);
        assert_eq!(lookup_by_western(Letter::G, Accidental::QuarterFlat, 8), None);
    }

    #[test]
    fn reverse_prefers_simplest_spelling() {
        let ro_dai = lookup_by_fingering(p(PitchStep::Ro, Register::Otsu), Alteration::Whole);
        assert_eq!(ro_dai, Some(WesternSpelling::new(Letter::C, Accidental::Natural, 4)));

        // Db4 and C#4 both sound ro meri; flat wins the tie.
        let ro_meri = lookup_by_fingering(p(PitchStep::Ro, Register::Otsu), Alteration::Half);
        assert_eq!(ro_meri, Some(WesternSpelling::new(Letter::D, Accidental::Flat, 4)));

        let ri_meri = lookup_by_fingering(p(PitchStep::Ri, Register::Kan), Alteration::Half);
        assert_eq!(ri_meri, Some(WesternSpelling::new(Letter::C, Accidental::Flat, 6)));
    }

    #[test]
    fn quarter_has_no_western_spelling() {
        let pitch = p(PitchStep::Re, Register::Otsu);
        assert_eq!(lookup_by_fingering(pitch, Alteration::Quarter), None);
    }

    #[test]
    fn every_twelve_tone_fingering_round_trips() {
        for pitch in all_fingerings() {
            for alteration in [Alteration::None, Alteration::Half, Alteration::Whole] {
                let spelling = lookup_by_fingering(pitch, alteration)
                    .unwrap_or_else(|| panic!("no spelling for {pitch:?} {alteration:?}"));
                assert_eq!(
                    lookup_by_western(spelling.letter, spelling.accidental, spelling.octave),
                    Some((pitch, alteration)),
                    "{spelling} did not round-trip"
                );
            }
        }
    }
}
