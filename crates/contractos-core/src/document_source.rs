//! Document source (C1, spec §4.1): a pluggable paragraph/table/offset
//! source. Byte-level DOCX/PDF decoding is explicitly out of scope (spec
//! §1) — this module defines the trait boundary and the plain-text source
//! used by tests and the CLI's `--format text` path.

use crate::contract::FileFormat;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub structural_path: String,
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub row: usize,
    pub col: usize,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub page_number: Option<u32>,
    pub col_header: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub text: String,
    pub level: u8,
    pub section_number: Option<String>,
    pub char_start: usize,
    pub char_end: usize,
}

/// `{text, paragraphs[], tables[], headings[]}`.
///
/// Guarantee: character offsets are stable and form a monotonic partition of
/// `text`. The concatenation of paragraph texts interleaved with table cell
/// texts in document order reconstructs `text`, whitespace-normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub text: String,
    pub paragraphs: Vec<Paragraph>,
    pub tables: Vec<Vec<TableCell>>,
    pub headings: Vec<Heading>,
}

impl ParsedDocument {
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A pluggable paragraph/table/offset source. Implementations handle one
/// byte format each (DOCX, PDF, ...); the pattern extractor and everything
/// downstream only ever sees a [`ParsedDocument`].
pub trait DocumentSource: Send + Sync {
    fn parse(&self, bytes: &[u8], format: FileFormat) -> CoreResult<ParsedDocument>;
}

/// A minimal source for already-plain text, split on blank lines into
/// paragraphs and on leading heading markers (`#`, numeric section
/// prefixes) into headings. Used by tests and by any adapter that has
/// already run DOCX/PDF extraction upstream and just wants offset bookkeeping.
pub struct PlainTextSource;

impl DocumentSource for PlainTextSource {
    fn parse(&self, bytes: &[u8], _format: FileFormat) -> CoreResult<ParsedDocument> {
        let text = String::from_utf8(bytes.to_vec())
            .map_err(|e| CoreError::Parse(format!("invalid utf-8: {e}")))?;
        if text.trim().is_empty() {
            return Ok(ParsedDocument::default());
        }
        if looks_like_image_only_marker(&text) {
            return Err(CoreError::UnextractableDocument(
                "no extractable text layer".to_string(),
            ));
        }

        let mut paragraphs = Vec::new();
        let mut headings = Vec::new();
        let mut offset = 0usize;
        let mut section_path: Vec<usize> = Vec::new();

        for block in split_keep_offsets(&text) {
            let (block_text, start, end) = block;
            offset = end;
            let trimmed = block_text.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(level) = heading_level(trimmed) {
                let section_number = parse_section_number(trimmed);
                bump_path(&mut section_path, level);
                headings.push(Heading {
                    text: trimmed.to_string(),
                    level,
                    section_number,
                    char_start: start,
                    char_end: end,
                });
            } else {
                let path = if section_path.is_empty() {
                    "root".to_string()
                } else {
                    section_path
                        .iter()
                        .map(|n| n.to_string())
                        .collect::<Vec<_>>()
                        .join(".")
                };
                paragraphs.push(Paragraph {
                    text: trimmed.to_string(),
                    char_start: start,
                    char_end: end,
                    structural_path: path,
                    page_number: None,
                });
            }
        }
        let _ = offset;

        Ok(ParsedDocument {
            text,
            paragraphs,
            tables: Vec::new(),
            headings,
        })
    }
}

fn looks_like_image_only_marker(text: &str) -> bool {
    text.trim() == "\u{FFFC}" || text.trim() == "[IMAGE-ONLY]"
}

/// Splits on blank lines, returning (block, char_start, char_end) for each
/// non-empty block, preserving byte offsets into the original text.
fn split_keep_offsets(text: &str) -> Vec<(&str, usize, usize)> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'\n' && i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
            out.push((&text[start..i], start, i));
            let mut j = i;
            while j < bytes.len() && bytes[j] == b'\n' {
                j += 1;
            }
            start = j;
            i = j;
        } else {
            i += 1;
        }
    }
    if start < bytes.len() {
        out.push((&text[start..], start, bytes.len()));
    }
    out
}

/// `#`, `##`, ... markdown-style, or a numeric leading token like `3.2.1`,
/// `Article XII`, `Section 4`.
fn heading_level(block: &str) -> Option<u8> {
    let first_line = block.lines().next().unwrap_or("");
    if let Some(rest) = first_line.strip_prefix('#') {
        let mut level = 1u8;
        let mut chars = rest.chars();
        while chars.clone().next() == Some('#') {
            level += 1;
            chars.next();
        }
        return Some(level.min(6));
    }
    let re = regex::Regex::new(r"^(\d+(\.\d+)*\.?|Article\s+[IVXLCDM]+|Section\s+\d+|§\s*\d+)\b")
        .expect("static pattern");
    if re.is_match(first_line) {
        let depth = first_line
            .split_whitespace()
            .next()
            .unwrap_or("")
            .matches('.')
            .count() as u8
            + 1;
        return Some(depth);
    }
    None
}

fn parse_section_number(block: &str) -> Option<String> {
    let first_line = block.lines().next().unwrap_or("");
    let re = regex::Regex::new(r"^(\d+(\.\d+)*|Article\s+[IVXLCDM]+|Section\s+\d+|§\s*\d+)").expect("static pattern");
    re.find(first_line).map(|m| m.as_str().trim().to_string())
}

fn bump_path(path: &mut Vec<usize>, level: u8) {
    let level = level as usize;
    if path.len() < level {
        path.resize(level, 0);
    } else {
        path.truncate(level);
    }
    path[level - 1] += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_parses_to_empty_result() {
        let doc = PlainTextSource.parse(b"", FileFormat::Docx).unwrap();
        assert!(doc.is_empty());
        assert!(doc.paragraphs.is_empty());
    }

    #[test]
    fn image_only_marker_is_unextractable() {
        let err = PlainTextSource
            .parse(b"[IMAGE-ONLY]", FileFormat::Pdf)
            .unwrap_err();
        assert!(matches!(err, CoreError::UnextractableDocument(_)));
    }

    #[test]
    fn offsets_round_trip_to_source_text() {
        let text = "1. Purpose\n\nThis sets the stage.\n\n2. Term\n\nThe term is one year.";
        let doc = PlainTextSource.parse(text.as_bytes(), FileFormat::Docx).unwrap();
        for p in &doc.paragraphs {
            assert_eq!(&doc.text[p.char_start..p.char_end], p.text);
        }
        for h in &doc.headings {
            assert_eq!(&doc.text[h.char_start..h.char_end], h.text);
        }
    }
}
