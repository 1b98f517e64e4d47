//! Compressed MusicXML (`.mxl`).
//!
//! `META-INF/container.xml` lists one or more `<rootfile>` entries; the first
//! whose media type is MusicXML (or unspecified) holds the score. Archives
//! without a container fall back to the first `.musicxml` entry, then the
//! first `.xml` entry outside `META-INF/`.

use std::io::{Cursor, Read};

use zip::result::ZipError;
use zip::ZipArchive;

use super::{musicxml, ParseOutcome};
use crate::error::{ParseError, ShakuResult};

/// ZIP local file header signature.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CONTAINER_PATH: &str = "META-INF/container.xml";
const MUSICXML_MEDIA_TYPE: &str = "application/vnd.recordare.musicxml+xml";
/// Fallback entry suffixes, most specific first.
const SCORE_SUFFIXES: [&str; 2] = [".musicxml", ".xml"];

/// Whether `data` looks like a ZIP archive rather than plain XML.
pub fn is_mxl(data: &[u8]) -> bool {
    data.starts_with(ZIP_MAGIC)
}

/// Read and parse a .mxl file from raw bytes.
pub fn parse_mxl(data: &[u8]) -> ShakuResult<ParseOutcome> {
    let mut archive = MxlArchive::open(data)?;
    let path = archive.score_path()?;
    log::debug!("mxl: reading score from '{path}'");
    let xml = archive.read_text(&path)?;
    musicxml::parse_musicxml(&xml)
}

fn archive_error(message: impl Into<String>) -> ParseError {
    ParseError::Archive(message.into())
}

struct MxlArchive<'a> {
    zip: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> MxlArchive<'a> {
    fn open(data: &'a [u8]) -> Result<Self, ParseError> {
        if !is_mxl(data) {
            return Err(archive_error("data is not a ZIP archive"));
        }
        let zip = ZipArchive::new(Cursor::new(data))
            .map_err(|e| archive_error(format!("failed to open MXL archive: {e}")))?;
        Ok(Self { zip })
    }

    /// Entry text, or `None` when the archive has no such entry.
    fn try_read_text(&mut self, name: &str) -> Result<Option<String>, ParseError> {
        let mut entry = match self.zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(archive_error(format!("failed to open '{name}': {e}"))),
        };
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| archive_error(format!("failed to read '{name}': {e}")))?;
        Ok(Some(text))
    }

    fn read_text(&mut self, name: &str) -> Result<String, ParseError> {
        self.try_read_text(name)?
            .ok_or_else(|| archive_error(format!("root file '{name}' not found in archive")))
    }

    fn score_path(&mut self) -> Result<String, ParseError> {
        if let Some(container) = self.try_read_text(CONTAINER_PATH)? {
            return rootfile_path(&container);
        }

        let names: Vec<&str> = self
            .zip
            .file_names()
            .filter(|name| !name.starts_with("META-INF/"))
            .collect();
        SCORE_SUFFIXES
            .iter()
            .find_map(|suffix| names.iter().find(|name| name.ends_with(suffix)))
            .map(|name| name.to_string())
            .ok_or_else(|| archive_error(format!("no MusicXML file found in archive: {names:?}")))
    }
}

/// First MusicXML rootfile named by a container document.
fn rootfile_path(container: &str) -> Result<String, ParseError> {
    let doc = roxmltree::Document::parse(container)
        .map_err(|e| archive_error(format!("failed to parse {CONTAINER_PATH}: {e}")))?;

    doc.descendants()
        .filter(|n| n.tag_name().name() == "rootfile")
        .filter(|n| {
            n.attribute("media-type")
                .map_or(true, |t| t == MUSICXML_MEDIA_TYPE)
        })
        .find_map(|n| n.attribute("full-path"))
        .map(String::from)
        .ok_or_else(|| archive_error(format!("no MusicXML rootfile in {CONTAINER_PATH}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rootfile_skips_other_media_types() {
        let container = r#"<container><rootfiles>
            <rootfile full-path="preview.pdf" media-type="application/pdf"/>
            <rootfile full-path="score.musicxml" media-type="application/vnd.recordare.musicxml+xml"/>
        </rootfiles></container>"#;
        assert_eq!(rootfile_path(container).unwrap(), "score.musicxml");
    }

    #[test]
    fn rootfile_without_media_type_is_accepted() {
        let container = r#"<container><rootfiles><rootfile full-path="a.xml"/></rootfiles></container>"#;
        assert_eq!(rootfile_path(container).unwrap(), "a.xml");
    }

    #[test]
    fn container_without_score_is_an_error() {
        let container = r#"<container><rootfiles>
            <rootfile full-path="preview.pdf" media-type="application/pdf"/>
        </rootfiles></container>"#;
        assert!(matches!(rootfile_path(container), Err(ParseError::Archive(_))));
    }

    #[test]
    fn plain_xml_is_not_an_archive() {
        assert!(!is_mxl(b"<?xml version=\"1.0\"?>"));
        assert!(matches!(
            MxlArchive::open(b"<score-partwise/>"),
            Err(ParseError::Archive(_))
        ));
    }
}
