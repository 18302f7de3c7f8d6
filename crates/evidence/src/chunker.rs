//! Deterministic text chunking with configurable size and overlap.
//!
//! Splits extracted document text into overlapping character windows with
//! contiguous zero-based indices. Cut points never land inside a token, so
//! identifiers like product codes and version strings survive chunking
//! intact in at least one chunk.

use crate::types::Chunk;
use attest_core::{AppError, AppResult};

/// Split text into overlapping chunks.
///
/// Windows are at most `max_chars` long and each subsequent window starts
/// `max_chars - overlap_chars` characters after the previous window's start,
/// so consecutive chunks overlap by exactly `overlap_chars` characters. When
/// a raw cut point falls inside a token, the window end is pulled outward to
/// the next word boundary; exact size uniformity is traded for never
/// truncating a meaningful token. The final chunk may be shorter.
///
/// Parameters are unsigned, so a negative overlap is unrepresentable;
/// `overlap_chars >= max_chars` (and `max_chars == 0`) fail with a
/// configuration error. Blank input yields an empty sequence.
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> AppResult<Vec<Chunk>> {
    if max_chars == 0 {
        return Err(AppError::Config(
            "max_chars must be greater than zero".to_string(),
        ));
    }
    if overlap_chars >= max_chars {
        return Err(AppError::Config(format!(
            "overlap_chars ({}) must be smaller than max_chars ({})",
            overlap_chars, max_chars
        )));
    }

    let normalized = normalize_artifacts(text);
    if normalized.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = normalized.chars().collect();
    let len = chars.len();
    let step = max_chars - overlap_chars;

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut index = 0u32;

    while start < len {
        let raw_end = (start + max_chars).min(len);
        let mut end = raw_end;

        // A cut inside a token is pulled outward to the next word boundary.
        if end < len && is_token_char(chars[end]) && is_token_char(chars[end - 1]) {
            while end < len && is_token_char(chars[end]) {
                end += 1;
            }
        }

        let content: String = chars[start..end].iter().collect();
        let content = content.trim();
        if !content.is_empty() {
            chunks.push(Chunk {
                index,
                content: content.to_string(),
            });
            index += 1;
        }

        if end >= len {
            break;
        }
        start += step;
    }

    tracing::debug!(
        "Chunked text into {} chunks (max: {}, overlap: {})",
        chunks.len(),
        max_chars,
        overlap_chars
    );

    Ok(chunks)
}

/// Repair Unicode artifacts left behind by text extraction.
///
/// Byte-order marks are stripped, non-breaking spaces become plain spaces,
/// replacement characters become hyphens (restoring mangled ranges such as
/// "30\u{fffd}90" to "30-90"), and dash variants fold to ASCII hyphen.
fn normalize_artifacts(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '\u{feff}' => {}
            '\u{a0}' => out.push(' '),
            '\u{fffd}' => out.push('-'),
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            _ => out.push(c),
        }
    }

    out
}

/// Characters that may appear inside a critical token.
///
/// Hyphen, dot, and plus occur inside product codes and version strings
/// ("AES-256", "TLS 1.2+"), which must never split across a chunk boundary.
fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '.' | '+')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = "word ".repeat(200);
        let chunks = chunk_text(&text, 100, 20).unwrap();

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as u32);
            assert!(!chunk.content.is_empty());
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(chunk_text("abc", 10, 10).is_err());
        assert!(chunk_text("abc", 10, 11).is_err());
        assert!(chunk_text("abc", 0, 0).is_err());
    }

    #[test]
    fn test_blank_input_yields_empty() {
        assert!(chunk_text("   \n\n  ", 100, 10).unwrap().is_empty());
        assert!(chunk_text("", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_window_step_positions() {
        // Single-letter words: no cut point ever lands inside a token, so
        // each window is exactly the raw span, trimmed.
        let text = "a b c d e f g h i j k l";
        let chunks = chunk_text(text, 7, 3).unwrap();

        assert_eq!(chunks[0].content, "a b c d");
        assert_eq!(chunks[1].content, "c d e f");
        assert_eq!(chunks[2].content, "e f g h");
        assert_eq!(chunks.last().unwrap().content, "i j k l");
    }

    #[test]
    fn test_token_survives_cut_boundary() {
        // The raw cut at 16 would split "AES-256"; the boundary is pulled
        // outward so the token stays whole.
        let text = "aaaa bbbb AES-256 cccc";
        let chunks = chunk_text(text, 10, 4).unwrap();

        assert!(
            chunks.iter().any(|c| c.content.contains("AES-256")),
            "expected AES-256 intact in some chunk: {:?}",
            chunks
        );
    }

    #[test]
    fn test_version_suffix_survives_cut_boundary() {
        let text = "connections require TLS 1.2+ everywhere";
        for max in 20..28 {
            let chunks = chunk_text(text, max, 8).unwrap();
            assert!(
                chunks.iter().any(|c| c.content.contains("1.2+")),
                "expected 1.2+ intact with max={}: {:?}",
                max,
                chunks
            );
        }
    }

    #[test]
    fn test_replacement_char_between_digits_becomes_hyphen() {
        let chunks = chunk_text("retention is 30\u{fffd}90 days", 100, 10).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("30-90"));
    }

    #[test]
    fn test_bom_nbsp_and_dashes_normalized() {
        let chunks = chunk_text("\u{feff}range 2013\u{2013}2014\u{a0}inclusive", 100, 10).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "range 2013-2014 inclusive");
    }

    #[test]
    fn test_overlap_region_repeats() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = chunk_text(text, 20, 8).unwrap();

        // Every consecutive pair shares the overlap region's text.
        for pair in chunks.windows(2) {
            let tail: String = pair[0].content.chars().rev().take(4).collect();
            let tail: String = tail.chars().rev().collect();
            assert!(
                pair[1].content.contains(tail.trim()),
                "expected overlap between {:?} and {:?}",
                pair[0].content,
                pair[1].content
            );
        }
    }
}
