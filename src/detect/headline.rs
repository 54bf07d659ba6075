//! Border glyphs, header separator lines and the column grid.
//!
//! A header separator is translated into one code per character:
//!
//! - `d` .. horizontal rule over a column's data
//! - `L`, `R` .. left and right outer frame
//! - `I` .. inner column rule
//! - ` ` .. gap between columns (tables drawn without vertical rules)

use std::sync::LazyLock;

use regex::Regex;

use super::{BorderType, ColumnRange, LineStyle};
use crate::text::{char_at_column, char_width, column_span, display_width, is_blank};

/// Row-count summaries printed after a result set.
static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(?\d+ rows?(\)| in set\b.*)$").expect("summary pattern is valid")
});

pub(super) fn is_horizontal(ch: char) -> bool {
    matches!(
        ch,
        '-' | '=' | '─' | '━' | '═' | '╌' | '┄' | '┈'
    )
}

/// Glyphs that can draw a vertical rule in a data row.
pub(super) fn is_vertical(ch: char) -> bool {
    matches!(ch, '|' | '│' | '┃' | '║' | '╎' | '┆' | '┊')
}

fn is_junction(ch: char) -> bool {
    matches!(
        ch,
        '+' | '┼' | '┬' | '┴' | '├' | '┤' | '┌' | '┐' | '└' | '┘'
            | '╋' | '┳' | '┻' | '┣' | '┫' | '┏' | '┓' | '┗' | '┛'
            | '╪' | '╤' | '╧' | '╞' | '╡' | '╒' | '╕' | '╘' | '╛'
            | '╬' | '╦' | '╩' | '╠' | '╣' | '╔' | '╗' | '╚' | '╝'
            | '╫' | '╥' | '╨' | '╟' | '╢' | '╓' | '╖' | '╙' | '╜'
    )
}

/// A rule glyph that separates columns or closes the frame.
pub(super) fn is_rule(ch: char) -> bool {
    is_vertical(ch) || is_junction(ch)
}

/// True for a line drawn only with border glyphs (and column gaps) that
/// contains at least one horizontal rule.
pub fn is_border_line(line: &str) -> bool {
    let line = line.trim_end();
    if line.is_empty() || line.starts_with(char::is_whitespace) {
        return false;
    }
    let mut has_horizontal = false;
    for ch in line.chars() {
        if is_horizontal(ch) {
            has_horizontal = true;
        } else if !(is_rule(ch) || ch == ' ') {
            return false;
        }
    }
    has_horizontal
}

/// True for a `(N rows)` style summary line.
pub fn is_summary_line(line: &str) -> bool {
    SUMMARY_RE.is_match(line.trim())
}

/// Translate a separator line into its glyph codes, one per character.
pub fn translate_headline(headline: &str) -> String {
    let headline = headline.trim_end();
    let count = headline.chars().count();
    headline
        .chars()
        .enumerate()
        .map(|(idx, ch)| {
            if is_horizontal(ch) {
                'd'
            } else if ch == ' ' {
                ' '
            } else if idx == 0 {
                'L'
            } else if idx + 1 == count {
                'R'
            } else {
                'I'
            }
        })
        .collect()
}

pub fn border_type_of(transl: &str) -> BorderType {
    if transl.contains('I') {
        BorderType::Full
    } else if transl.contains(['L', 'R']) {
        BorderType::Outer
    } else {
        BorderType::None
    }
}

pub fn linestyle_of(headline: &str) -> LineStyle {
    if headline.is_ascii() {
        LineStyle::Ascii
    } else {
        LineStyle::Unicode
    }
}

/// Column ranges for each run of horizontal rule glyphs in `headline`,
/// with names cut from the aligned `namesline`.
pub fn column_ranges(headline: &str, namesline: &str) -> Vec<ColumnRange> {
    let headline = headline.trim_end();
    let mut ranges = Vec::new();
    let mut run: Option<(usize, usize)> = None;
    let mut col = 0usize;

    for (idx, ch) in headline.char_indices() {
        if is_horizontal(ch) {
            run.get_or_insert((idx, col));
        } else if let Some((xmin, dmin)) = run.take() {
            ranges.push(ColumnRange::new(xmin, idx, dmin, col, namesline));
        }
        col += char_width(ch);
    }
    if let Some((xmin, dmin)) = run {
        ranges.push(ColumnRange::new(xmin, headline.len(), dmin, col, namesline));
    }
    ranges
}

impl ColumnRange {
    fn new(xmin: usize, xmax: usize, dmin: usize, dmax: usize, namesline: &str) -> Self {
        let mut range = Self {
            xmin,
            xmax,
            dmin,
            dmax,
            name: String::new(),
            name_pos: 0,
            name_width: 0,
            name_offset: 0,
            name_size: 0,
            numeric: None,
        };
        range.locate_name(namesline);
        range
    }

    /// Fill the name fields from the part of `namesline` under this column.
    pub(crate) fn locate_name(&mut self, namesline: &str) {
        let Some((start, end)) = column_span(namesline, self.dmin, self.dmax) else {
            self.name_pos = namesline.chars().count();
            self.name_offset = namesline.len();
            return;
        };
        let cell = &namesline[start..end];
        let strip = |ch: char| ch.is_whitespace() || is_vertical(ch);
        let trimmed = cell.trim_matches(strip);
        let lead = cell.len() - cell.trim_start_matches(strip).len();
        self.name = trimmed.to_string();
        self.name_offset = start + lead;
        self.name_size = trimmed.len();
        self.name_pos = namesline[..self.name_offset].chars().count();
        self.name_width = display_width(trimmed);
    }
}

/// Rule positions a data row must carry to belong to the table body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    left: Option<usize>,
    right: Option<usize>,
    inner: Vec<usize>,
}

impl Grid {
    /// Build the grid from a translated headline, counting display columns
    /// through the original separator.
    pub fn new(headline: &str, transl: &str) -> Self {
        let mut grid = Self::default();
        let mut col = 0usize;
        for (ch, code) in headline.chars().zip(transl.chars()) {
            match code {
                'L' => grid.left = Some(col),
                'R' => grid.right = Some(col),
                'I' => grid.inner.push(col),
                _ => {}
            }
            col += char_width(ch);
        }
        grid
    }

    pub const fn has_frame(&self) -> bool {
        self.left.is_some()
    }

    pub fn has_rules(&self) -> bool {
        self.left.is_some() || self.right.is_some() || !self.inner.is_empty()
    }

    /// Display column of the left frame glyph.
    pub const fn left(&self) -> Option<usize> {
        self.left
    }

    /// True when the vertical rules of `line` sit exactly under the
    /// separator's rules.
    pub fn is_aligned(&self, line: &str) -> bool {
        let rule_at = |col: usize| char_at_column(line, col).is_some_and(is_vertical);
        self.left.is_none_or(rule_at) && self.inner.iter().all(|&col| rule_at(col))
    }

    /// True when `line` is a body row of this grid.
    ///
    /// Framed tables need the left rule in place. Unframed rows whose rules
    /// drifted (hand-written tables) still count when they carry enough rules.
    pub fn fits(&self, line: &str) -> bool {
        if is_blank(line) || is_border_line(line) {
            return false;
        }
        if !self.has_rules() {
            return !is_summary_line(line);
        }
        if self.is_aligned(line) {
            return true;
        }
        self.left.is_none()
            && !is_summary_line(line)
            && line.chars().filter(|ch| is_vertical(*ch)).count() >= self.inner.len()
    }
}
