//! Byte, character and display-column conversions.
//!
//! Column geometry is measured in display columns (double-width characters
//! count twice) while stored offsets are bytes; these helpers translate
//! between the two without allocating.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of `text` in terminal columns.
pub fn display_width(text: &str) -> usize {
    UnicodeWidthStr::width(text)
}

/// Width of a single character, treating control characters as zero-width.
pub fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

/// Byte range of the characters that start inside display columns
/// `[dmin, dmax)`.
///
/// Returns `None` when the line ends before `dmin`.
pub fn column_span(line: &str, dmin: usize, dmax: usize) -> Option<(usize, usize)> {
    let mut col = 0usize;
    let mut start = None;
    for (idx, ch) in line.char_indices() {
        if col >= dmax {
            return start.map(|s| (s, idx));
        }
        if start.is_none() && col >= dmin {
            start = Some(idx);
        }
        col += char_width(ch);
    }
    start.map(|s| (s, line.len()))
}

/// Slice of `line` covering display columns `[dmin, dmax)`, or `""`.
pub fn column_slice(line: &str, dmin: usize, dmax: usize) -> &str {
    column_span(line, dmin, dmax).map_or("", |(start, end)| &line[start..end])
}

/// The character that starts exactly at display column `col`.
pub fn char_at_column(line: &str, col: usize) -> Option<char> {
    let mut pos = 0usize;
    for ch in line.chars() {
        if pos == col {
            return Some(ch);
        }
        if pos > col {
            return None;
        }
        pos += char_width(ch);
    }
    None
}

/// Number of characters preceding byte offset `byte`.
pub fn char_offset(line: &str, byte: usize) -> usize {
    line.char_indices().take_while(|(idx, _)| *idx < byte).count()
}

/// Display column at which byte offset `byte` starts.
pub fn display_offset(line: &str, byte: usize) -> usize {
    line.char_indices()
        .take_while(|(idx, _)| *idx < byte)
        .map(|(_, ch)| char_width(ch))
        .sum()
}

/// Keep at most `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// True when the line holds nothing but whitespace.
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}
