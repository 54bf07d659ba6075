//! Expanded (one field per line) record layout.
//!
//! Each record starts with a banner such as `-[ RECORD 12 ]-+------`,
//! `+-[ RECORD 12 ]-+----+`, `─[ RECORD 12 ]─┬────` or `* Record 12`.

use std::sync::LazyLock;

use regex::Regex;

use super::headline::is_rule;
use super::{BorderType, LineStyle};

static BANNER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[+|├┌└╞╟╠]?[-─═]\[ RECORD (\d+) \]|\* Record (\d+)\b)")
        .expect("record banner pattern is valid")
});

/// A parsed record banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Banner {
    pub recno: u64,
    /// Character position of the `[` (or `*`) opening the record info.
    pub info_minx: usize,
    pub border_type: BorderType,
    pub linestyle: LineStyle,
}

/// Parse a record banner line.
pub fn parse_banner(line: &str) -> Option<Banner> {
    let caps = BANNER_RE.captures(line)?;
    let digits = caps.get(1).or_else(|| caps.get(2))?;
    let recno = digits.as_str().parse().ok()?;
    let info_minx = line
        .char_indices()
        .position(|(_, ch)| ch == '[' || ch == '*')?;
    let whole = caps.get(0)?;
    let framed = line.starts_with(is_rule);
    let rules_after = line[whole.end()..].chars().any(is_rule);
    let border_type = if framed || rules_after {
        BorderType::Full
    } else {
        BorderType::None
    };
    let linestyle = if line.is_ascii() {
        LineStyle::Ascii
    } else {
        LineStyle::Unicode
    };
    Some(Banner {
        recno,
        info_minx,
        border_type,
        linestyle,
    })
}

pub fn is_banner(line: &str) -> bool {
    BANNER_RE.is_match(line)
}

/// Offset from `row` back to the banner at `banner_row`, saturated to the
/// range a line record can hold.
pub fn recno_offset(banner_row: usize, row: usize) -> i16 {
    let distance = row.saturating_sub(banner_row);
    i16::try_from(distance).map_or(i16::MIN, |d| -d)
}
