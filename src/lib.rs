//! shakulib — shakuhachi notation library.
//!
//! Converts scores between native JSON, MusicXML (plain `.musicxml` and
//! compressed `.mxl`) and an ABC tablature dialect, and lays them out in
//! right-to-left columns with the instrument's octave, meri and duration
//! marks.
//!
//! # Example
//! ```no_run
//! use shakulib::{convert, parse_file, render_layout, Format, RenderOptions};
//!
//! let abc = std::fs::read_to_string("path/to/tune.abc").unwrap();
//! let xml = convert(&abc, Format::TabletextAbc, Format::StaffXml).unwrap();
//! println!("{xml}");
//!
//! let outcome = parse_file("path/to/score.musicxml").unwrap();
//! for warning in &outcome.warnings {
//!     println!("{warning}");
//! }
//! let page = render_layout(&outcome.score, 400.0, 600.0, &RenderOptions::default());
//! println!("Columns: {}", page.layout.column_count());
//! ```

pub mod codec;
pub mod error;
pub mod model;
pub mod pitch_table;
pub mod renderer;

use std::path::Path;

pub use codec::mxl::{is_mxl, parse_mxl};
pub use codec::{Format, FormatCodec, ParseOutcome};
pub use error::*;
pub use model::*;
pub use renderer::{
    layout, render_layout, resolve_modifiers, ColumnLayout, DecoratedNote, LayoutOptions,
    RenderOptions, RenderedScore,
};

/// Parse `text` in the given format.
pub fn parse(text: &str, format: Format) -> ShakuResult<ParseOutcome> {
    format.codec().parse(text)
}

/// Parse raw bytes. StaffXML input may be a `.mxl` archive; text formats
/// must be UTF-8 (a leading byte-order mark is ignored).
pub fn parse_bytes(data: &[u8], format: Format) -> ShakuResult<ParseOutcome> {
    if format == Format::StaffXml && is_mxl(data) {
        return parse_mxl(data);
    }
    let text = std::str::from_utf8(data)
        .map_err(|e| ParseError::Encoding(format!("{format} input is not UTF-8: {e}")))?;
    parse(text.trim_start_matches('\u{feff}'), format)
}

/// Guess the format of raw bytes from their first significant character.
pub fn detect_format(data: &[u8]) -> Format {
    if is_mxl(data) {
        return Format::StaffXml;
    }
    let first = data
        .iter()
        .copied()
        .find(|b| !b.is_ascii_whitespace() && b.is_ascii());
    match first {
        Some(b'{') => Format::Json,
        Some(b'<') => Format::StaffXml,
        _ => Format::TabletextAbc,
    }
}

/// Parse a score file. The format comes from the file extension
/// (`.json`, `.musicxml`/`.xml`/`.mxl`, `.abc`) or, failing that, from
/// the content.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ShakuResult<ParseOutcome> {
    let path = path.as_ref();
    let data = std::fs::read(path)
        .map_err(|e| ParseError::Io(format!("failed to read file '{}': {e}", path.display())))?;

    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(Format::from_extension)
        .unwrap_or_else(|| detect_format(&data));
    log::debug!("parsing '{}' as {format}", path.display());
    parse_bytes(&data, format)
}

/// Write a score in the given format.
pub fn serialize(score: &ScoreModel, format: Format) -> ShakuResult<String> {
    format.codec().serialize(score)
}

/// Convert text between formats. Converting a format to itself returns the
/// input unchanged.
pub fn convert(text: &str, from: Format, to: Format) -> ShakuResult<String> {
    if from == to {
        return Ok(text.to_string());
    }
    let outcome = parse(text, from)?;
    if !outcome.warnings.is_empty() {
        log::warn!(
            "{from} → {to}: {} notes skipped during import",
            outcome.warnings.len()
        );
    }
    serialize(&outcome.score, to)
}

// ═══════════════════════════════════════════════════════════════════════
// C FFI — for host applications (static library / cdylib)
// ═══════════════════════════════════════════════════════════════════════

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Borrow a C string as UTF-8, or `None` for null / invalid input.
///
/// # Safety
/// `ptr` must be null or a valid null-terminated C string.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn into_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Convert a score between formats (`"json"`, `"musicxml"`, `"abc"`).
/// Returns null on any error. The caller must free the returned string with
/// `shakulib_free_string`.
///
/// # Safety
/// All arguments must be valid null-terminated UTF-8 C strings.
#[no_mangle]
pub unsafe extern "C" fn shakulib_convert(
    text: *const c_char,
    from: *const c_char,
    to: *const c_char,
) -> *mut c_char {
    let (Some(text), Some(from), Some(to)) =
        (unsafe { str_arg(text) }, unsafe { str_arg(from) }, unsafe { str_arg(to) })
    else {
        return std::ptr::null_mut();
    };
    let (Ok(from), Ok(to)) = (from.parse::<Format>(), to.parse::<Format>()) else {
        return std::ptr::null_mut();
    };

    match convert(text, from, to) {
        Ok(out) => into_c_string(out),
        Err(e) => {
            log::warn!("shakulib_convert failed: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Lay out a native JSON score and return the rendered page as JSON.
/// `options_json` may be null for default options. Returns null on error.
/// The caller must free the returned string with `shakulib_free_string`.
///
/// # Safety
/// `score_json` must be a valid null-terminated UTF-8 C string;
/// `options_json` must be null or one.
#[no_mangle]
pub unsafe extern "C" fn shakulib_layout_json(
    score_json: *const c_char,
    width: f64,
    height: f64,
    options_json: *const c_char,
) -> *mut c_char {
    let Some(score_json) = (unsafe { str_arg(score_json) }) else {
        return std::ptr::null_mut();
    };
    let options = match unsafe { str_arg(options_json) } {
        Some(json) => match RenderOptions::from_json(json) {
            Ok(o) => o,
            Err(e) => {
                log::warn!("shakulib_layout_json: bad options: {e}");
                return std::ptr::null_mut();
            }
        },
        None => RenderOptions::default(),
    };

    let score = match parse(score_json, Format::Json) {
        Ok(outcome) => outcome.score,
        Err(e) => {
            log::warn!("shakulib_layout_json: {e}");
            return std::ptr::null_mut();
        }
    };

    match render_layout(&score, width, height, &options).to_json() {
        Ok(json) => into_c_string(json),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free a string previously returned by shakulib functions.
///
/// # Safety
/// `ptr` must be a string previously returned by a shakulib function, or null.
#[no_mangle]
pub unsafe extern "C" fn shakulib_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}
