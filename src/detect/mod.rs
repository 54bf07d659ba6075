//! Table structure detection.
//!
//! This module turns stored lines into a [`TableDescriptor`]:
//! - Expanded record layout (`-[ RECORD n ]` banners)
//! - Header, header separator and outer borders
//! - Column boundaries and names
//! - Title above the table and footer below it
//! - Rows continued on the following line (multiline cells)
//!
//! Detection never fails on odd input; anything without a recognizable grid
//! becomes a single unbounded column.

mod expanded;
mod headline;
mod multiline;
#[cfg(test)]
mod tests;

use std::ops::RangeInclusive;

use serde::Serialize;

pub use expanded::{Banner, parse_banner};
pub use headline::{Grid, is_border_line, is_summary_line, translate_headline};
pub(crate) use multiline::continued_head;
pub use multiline::multilines_detection;

use crate::config::{FooterPolicy, InputFormat};
use crate::cursor::Mark;
use crate::error::Result;
use crate::perf;
use crate::store::PagedLineStore;
use crate::text::{column_span, is_blank, truncate_chars};

/// Longest title kept, in characters.
pub const MAX_TITLE_CHARS: usize = 64;

/// Rows searched for a header separator before falling back to plain text.
const HEADER_SCAN_ROWS: usize = 64;

/// How many rules delimit the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderType {
    /// No vertical rules; columns are separated by gaps.
    #[default]
    None,
    /// A frame around the table without inner column rules.
    Outer,
    /// Inner column rules, with or without a frame.
    Full,
}

impl BorderType {
    /// Numeric level: 0 none, 1 outer only, 2 full grid.
    pub const fn level(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Outer => 1,
            Self::Full => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Ascii,
    Unicode,
}

/// One column's boundaries and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRange {
    /// Byte range in the header separator line.
    pub xmin: usize,
    pub xmax: usize,
    /// Display-column range, used to cut cells out of data lines.
    pub dmin: usize,
    pub dmax: usize,
    pub name: String,
    /// Position of the name in characters within the names line.
    pub name_pos: usize,
    /// Display width of the name.
    pub name_width: usize,
    /// Byte offset and length of the name within the names line.
    pub name_offset: usize,
    pub name_size: usize,
    /// Declared content type, known only for tables built from typed rows.
    pub numeric: Option<bool>,
}

impl ColumnRange {
    /// A nameless column covering whole lines.
    pub(crate) fn unbounded(max_bytes: usize, max_width: usize) -> Self {
        Self {
            xmin: 0,
            xmax: max_bytes,
            dmin: 0,
            dmax: max_width,
            name: String::new(),
            name_pos: 0,
            name_width: 0,
            name_offset: 0,
            name_size: 0,
            numeric: None,
        }
    }

    pub const fn width(&self) -> usize {
        self.dmax - self.dmin
    }
}

/// Detection settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectOptions {
    pub format: InputFormat,
    pub footer_policy: FooterPolicy,
}

/// The structural model of a table.
///
/// Once `completed` is set the descriptor only changes through
/// [`TableDescriptor::observe_appended`] growing the row counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableDescriptor {
    pub border_top_row: Option<usize>,
    pub border_head_row: Option<usize>,
    pub border_bottom_row: Option<usize>,
    pub border_type: BorderType,
    pub linestyle: LineStyle,
    pub is_expanded_mode: bool,
    /// Character position where record info starts in expanded mode.
    pub expanded_info_minx: Option<usize>,
    pub title: Option<String>,
    /// Name of the input, for display next to the title.
    pub filename: Option<String>,
    /// A framed table whose header separator starts and ends with a
    /// vertical rule (`|----+----|`), as pgcli draws it.
    pub is_pgcli_fmt: bool,
    /// Rows above the header block, skipped from the table proper.
    pub title_rows: usize,
    pub namesline: Option<String>,
    pub headline: Option<String>,
    pub headline_transl: Option<String>,
    pub headline_size: usize,
    pub headline_char_size: usize,
    pub cranges: Vec<ColumnRange>,
    pub columns: usize,
    pub first_data_row: usize,
    pub last_data_row: Option<usize>,
    pub footer_row: Option<usize>,
    /// Display width of the widest footer line.
    pub footer_char_size: usize,
    /// The footer candidate not chosen by the footer policy (outer-only tables).
    pub alt_footer_row: Option<usize>,
    /// Last non-blank row.
    pub last_row: Option<usize>,
    pub total_rows: usize,
    pub data_rows: usize,
    pub fixed_rows: usize,
    pub fixed_columns: usize,
    pub freeze_two_cols: bool,
    pub has_multilines: bool,
    pub multilines_already_tested: bool,
    pub max_bytes: usize,
    pub max_width: usize,
    pub initialized: bool,
    pub completed: bool,
    #[serde(skip)]
    pub(crate) grid: Grid,
}

impl TableDescriptor {
    /// Plain-text model: one unbounded column over every stored line.
    pub fn plain(store: &PagedLineStore) -> Self {
        let mut desc = Self::default();
        desc.apply_plain(store);
        desc.initialized = true;
        desc
    }

    fn apply_plain(&mut self, store: &PagedLineStore) {
        let total = store.row_count();
        *self = Self {
            cranges: vec![ColumnRange::unbounded(store.max_bytes(), store.max_width())],
            columns: 1,
            total_rows: total,
            last_data_row: total.checked_sub(1),
            data_rows: total,
            last_row: last_nonblank(store, 0..total),
            max_bytes: store.max_bytes(),
            max_width: store.max_width(),
            initialized: self.initialized,
            completed: self.completed,
            ..Self::default()
        };
    }

    /// True when no grid was recognized.
    pub const fn is_plain(&self) -> bool {
        self.headline.is_none() && !self.is_expanded_mode
    }

    /// Rows holding table data, in storage numbering.
    pub fn data_range(&self) -> Option<RangeInclusive<usize>> {
        self.last_data_row
            .filter(|last| *last >= self.first_data_row)
            .map(|last| self.first_data_row..=last)
    }

    pub fn is_data_row(&self, row: usize) -> bool {
        self.data_range().is_some_and(|range| range.contains(&row))
    }

    pub fn column(&self, index: usize) -> Option<&ColumnRange> {
        self.cranges.get(index)
    }

    /// Index of the column covering display column `col`.
    pub fn column_at(&self, col: usize) -> Option<usize> {
        self.cranges
            .iter()
            .position(|range| range.dmin <= col && col < range.dmax)
    }

    /// Byte range of the cell of `column` in `line`.
    ///
    /// Cells are cut by display column. Rows whose rules do not line up
    /// with the separator are split on their rule glyphs instead.
    pub fn cell_span(&self, line: &str, column: usize) -> Option<(usize, usize)> {
        let range = self.cranges.get(column)?;
        if self.is_expanded_mode || !self.grid.has_rules() || self.grid.is_aligned(line) {
            return column_span(line, range.dmin, range.dmax);
        }
        let mut cells = Vec::new();
        let mut start = 0;
        for (idx, ch) in line.char_indices() {
            if headline::is_vertical(ch) {
                cells.push((start, idx));
                start = idx + ch.len_utf8();
            }
        }
        cells.push((start, line.len()));
        let skip = usize::from(self.grid.has_frame());
        cells.get(column + skip).copied()
    }

    /// Text of the cell of `column` in `line`, untrimmed.
    pub fn cell<'a>(&self, line: &'a str, column: usize) -> &'a str {
        self.cell_span(line, column)
            .map_or("", |(start, end)| &line[start..end])
    }

    /// Record number of the expanded-mode record containing `row`.
    pub fn record_number(&self, store: &PagedLineStore, row: usize) -> Option<u64> {
        if !self.is_expanded_mode {
            return None;
        }
        let (_, info) = store.get(row)?;
        let back = usize::from(info.recno_offset().unsigned_abs());
        let (banner, _) = store.get(row.checked_sub(back)?)?;
        parse_banner(banner).map(|banner| banner.recno)
    }

    /// Account for rows appended after detection, without re-detecting.
    ///
    /// New rows are assumed to follow the detected grid: they extend the
    /// data region until the first row that does not fit it, which becomes
    /// the bottom border or the footer.
    ///
    /// # Errors
    /// Fails only when flag writes hit a stale store, which cannot happen for
    /// rows of the current generation.
    pub fn observe_appended(&mut self, store: &mut PagedLineStore, from_row: usize) -> Result<()> {
        let total = store.row_count();
        if from_row >= total {
            return Ok(());
        }
        self.total_rows = total;
        self.max_bytes = store.max_bytes();
        self.max_width = store.max_width();
        if let Some(last) = last_nonblank(store, from_row..total) {
            self.last_row = Some(last);
        }

        if self.is_expanded_mode {
            return self.observe_expanded(store, from_row);
        }
        if self.headline.is_none() {
            self.cranges = vec![ColumnRange::unbounded(self.max_bytes, self.max_width)];
            self.last_data_row = total.checked_sub(1);
            self.data_rows = total;
            return Ok(());
        }

        let grid = self.grid.clone();
        let first_new_data = self.data_end();
        for row in from_row..total {
            let Some((line, _)) = store.get(row) else {
                break;
            };
            let open = self.footer_row.is_none()
                && self.border_bottom_row.is_none()
                && row == self.data_end();
            if open && grid.fits(line) {
                self.last_data_row = Some(row);
                self.data_rows += 1;
                continue;
            }
            if is_blank(line) {
                continue;
            }
            if open && is_border_line(line) {
                self.border_bottom_row = Some(row);
                continue;
            }
            if self.footer_row.is_none() {
                self.footer_row = Some(row);
            }
            if let Some(mark) = Mark::at_row(store, row) {
                mark.set_unknown(store, true)?;
            }
        }

        if self.multilines_already_tested {
            if let Some(last) = self.last_data_row.filter(|last| *last >= first_new_data) {
                multiline::mark_rows(store, self, first_new_data..=last)?;
            }
        }
        self.measure_footer(store);
        Ok(())
    }

    fn observe_expanded(&mut self, store: &mut PagedLineStore, from_row: usize) -> Result<()> {
        let total = store.row_count();
        let mut banner_row = from_row
            .checked_sub(1)
            .and_then(|prev| {
                let (_, info) = store.get(prev)?;
                prev.checked_sub(usize::from(info.recno_offset().unsigned_abs()))
            })
            .unwrap_or(self.first_data_row);
        for row in from_row..total {
            let Some((line, _)) = store.get(row) else {
                break;
            };
            if expanded::is_banner(line) {
                banner_row = row;
            } else if let Some(mark) = Mark::at_row(store, row) {
                mark.set_recno_offset(store, expanded::recno_offset(banner_row, row))?;
            }
        }
        if let Some(last) = self.last_row {
            self.last_data_row = Some(last);
            self.data_rows = last + 1 - self.first_data_row;
        }
        if let Some(range) = self.cranges.first_mut() {
            range.xmax = self.max_bytes;
            range.dmax = self.max_width;
        }
        Ok(())
    }

    /// Install a header separator whose column ranges are already known.
    pub(crate) fn attach_headline(&mut self, headline: String) {
        let transl = translate_headline(&headline);
        self.grid = Grid::new(&headline, &transl);
        self.border_type = headline::border_type_of(&transl);
        self.linestyle = headline::linestyle_of(&headline);
        self.headline_size = headline.len();
        self.headline_char_size = headline.chars().count();
        self.headline_transl = Some(transl);
        self.headline = Some(headline);
    }

    /// Measure the footer lines, from the footer row down to the last
    /// non-blank row, leaving out the bottom border.
    pub(crate) fn measure_footer(&mut self, store: &PagedLineStore) {
        self.footer_char_size = self.footer_row.map_or(0, |footer| {
            let last = self.last_row.unwrap_or(footer).max(footer);
            (footer..=last)
                .filter(|row| self.border_bottom_row != Some(*row))
                .map(|row| crate::text::display_width(line_at(store, row).trim_end()))
                .max()
                .unwrap_or(0)
        });
    }

    /// First row after the current data region.
    fn data_end(&self) -> usize {
        self.last_data_row.map_or(self.first_data_row, |last| last + 1)
    }
}

fn line_at(store: &PagedLineStore, row: usize) -> &str {
    store.get(row).map_or("", |(line, _)| line)
}

fn last_nonblank(store: &PagedLineStore, rows: std::ops::Range<usize>) -> Option<usize> {
    rows.rev().find(|&row| !is_blank(line_at(store, row)))
}

fn first_nonblank(store: &PagedLineStore, rows: std::ops::Range<usize>) -> Option<usize> {
    rows.into_iter().find(|&row| !is_blank(line_at(store, row)))
}

/// Analyze the stored lines and build the table descriptor.
///
/// CSV, TSV and matrix input is formatted into a table before it is stored
/// (see [`crate::rows`]); for those formats the stored text is analyzed like
/// any other table.
///
/// # Errors
/// Fails only when flag writes hit a stale store.
pub fn analyze(store: &mut PagedLineStore, options: &DetectOptions) -> Result<TableDescriptor> {
    let _scope = perf::scope("detect.analyze");
    let mut desc = TableDescriptor {
        initialized: true,
        ..TableDescriptor::default()
    };

    let detected = match options.format {
        InputFormat::Plain => false,
        _ => detect_expanded(store, &mut desc)? || detect_grid(store, &mut desc, options)?,
    };
    if !detected {
        desc.apply_plain(store);
        tracing::debug!(rows = desc.total_rows, "no table structure, plain text model");
        return Ok(desc);
    }

    multilines_detection(store, &mut desc)?;
    perf::log_event(
        "detect.done",
        format!(
            "rows={} columns={} border={:?} expanded={} multilines={}",
            desc.total_rows,
            desc.columns,
            desc.border_type,
            desc.is_expanded_mode,
            desc.has_multilines
        ),
    );
    Ok(desc)
}

fn detect_expanded(store: &mut PagedLineStore, desc: &mut TableDescriptor) -> Result<bool> {
    let total = store.row_count();
    let Some(first) = first_nonblank(store, 0..total) else {
        return Ok(false);
    };
    let Some(banner) = parse_banner(line_at(store, first)) else {
        return Ok(false);
    };

    desc.is_expanded_mode = true;
    desc.expanded_info_minx = Some(banner.info_minx);
    desc.border_type = banner.border_type;
    desc.linestyle = banner.linestyle;
    desc.title_rows = first;
    desc.first_data_row = first;
    desc.fixed_rows = 0;
    desc.total_rows = total;
    desc.max_bytes = store.max_bytes();
    desc.max_width = store.max_width();
    desc.cranges = vec![ColumnRange::unbounded(desc.max_bytes, desc.max_width)];
    desc.columns = 1;

    let mut banner_row = first;
    for row in first..total {
        if expanded::is_banner(line_at(store, row)) {
            banner_row = row;
        } else if let Some(mark) = Mark::at_row(store, row) {
            mark.set_recno_offset(store, expanded::recno_offset(banner_row, row))?;
        }
    }

    let mut last = last_nonblank(store, first..total);
    desc.last_row = last;
    if let Some(row) = last.filter(|&row| is_summary_line(line_at(store, row))) {
        desc.footer_row = Some(row);
        last = last_nonblank(store, first..row);
    }
    if let Some(row) = last.filter(|&row| row > first && is_border_line(line_at(store, row))) {
        desc.border_bottom_row = Some(row);
        last = last_nonblank(store, first..row);
    }
    desc.last_data_row = last;
    desc.data_rows = last.map_or(0, |last| last + 1 - first);
    desc.measure_footer(store);
    desc.multilines_already_tested = true;
    tracing::debug!(first, records_end = ?last, "expanded record layout");
    Ok(true)
}

fn detect_grid(
    store: &mut PagedLineStore,
    desc: &mut TableDescriptor,
    options: &DetectOptions,
) -> Result<bool> {
    let total = store.row_count();
    let Some(first_border) =
        (0..total.min(HEADER_SCAN_ROWS)).find(|&row| is_border_line(line_at(store, row)))
    else {
        return Ok(false);
    };
    let is_names = |row: usize| {
        let line = line_at(store, row);
        !is_blank(line) && !is_border_line(line)
    };
    // Only framed tables draw a top border above the names line.
    let framed = line_at(store, first_border).starts_with(headline::is_rule);
    let (top, head) = if framed
        && first_border + 2 < total
        && is_names(first_border + 1)
        && is_border_line(line_at(store, first_border + 2))
    {
        (Some(first_border), first_border + 2)
    } else if first_border > 0 && is_names(first_border - 1) {
        (None, first_border)
    } else {
        return Ok(false);
    };

    let names_row = head - 1;
    let headline = line_at(store, head).trim_end().to_string();
    let namesline = line_at(store, names_row).to_string();
    let cranges = headline::column_ranges(&headline, &namesline);
    if cranges.is_empty() {
        return Ok(false);
    }
    let transl = translate_headline(&headline);
    let grid = Grid::new(&headline, &transl);

    let block_start = top.unwrap_or(names_row);

    desc.border_top_row = top;
    desc.border_head_row = Some(head);
    desc.is_pgcli_fmt = top.is_some()
        && headline.starts_with(headline::is_vertical)
        && headline.ends_with(headline::is_vertical);
    desc.border_type = headline::border_type_of(&transl);
    desc.linestyle = headline::linestyle_of(&headline);
    desc.title_rows = block_start;
    desc.title = first_nonblank(store, 0..block_start).and_then(|row| {
        let title = line_at(store, row).trim();
        (crate::text::display_width(title) <= crate::text::display_width(&headline))
            .then(|| truncate_chars(title, MAX_TITLE_CHARS).to_string())
    });
    desc.headline_size = headline.len();
    desc.headline_char_size = headline.chars().count();
    desc.columns = cranges.len();
    desc.freeze_two_cols = cranges.len() > 2 && cranges[0].name.eq_ignore_ascii_case("oid");
    desc.fixed_columns = if desc.freeze_two_cols { 2 } else { 1 };
    desc.cranges = cranges;
    desc.grid = grid.clone();
    desc.headline = Some(headline);
    desc.headline_transl = Some(transl);
    desc.namesline = Some(namesline);
    desc.first_data_row = head + 1;
    desc.fixed_rows = desc.first_data_row - desc.title_rows;
    desc.total_rows = total;
    desc.max_bytes = store.max_bytes();
    desc.max_width = store.max_width();
    desc.last_row = last_nonblank(store, 0..total);

    let mut last_data = None;
    let mut row = head + 1;
    while row < total && grid.fits(line_at(store, row)) {
        last_data = Some(row);
        row += 1;
    }
    desc.last_data_row = last_data;
    if row < total && is_border_line(line_at(store, row)) {
        desc.border_bottom_row = Some(row);
        row += 1;
    }

    let bordered = first_nonblank(store, row..total);
    let borderless = (desc.border_type == BorderType::Outer)
        .then(|| last_data.filter(|&last| is_framed_summary(line_at(store, last), &grid)))
        .flatten();
    let (primary, secondary) = match options.footer_policy {
        FooterPolicy::Bordered => (bordered, borderless),
        FooterPolicy::Borderless => (borderless, bordered),
    };
    desc.footer_row = primary.or(secondary);
    desc.alt_footer_row = primary.and(secondary);
    if let Some(inner) = borderless.filter(|row| desc.footer_row == Some(*row)) {
        desc.last_data_row = inner.checked_sub(1).filter(|&last| last > head);
    }
    desc.data_rows = desc
        .data_range()
        .map_or(0, |range| range.end() + 1 - range.start());
    desc.measure_footer(store);

    let inner_footer = desc.footer_row.filter(|footer| *footer < row);
    for row in (0..block_start).chain(inner_footer).chain(row..total) {
        if !is_blank(line_at(store, row)) {
            if let Some(mark) = Mark::at_row(store, row) {
                mark.set_unknown(store, true)?;
            }
        }
    }

    tracing::debug!(
        head,
        columns = desc.columns,
        border = desc.border_type.level(),
        footer = ?desc.footer_row,
        "table grid detected"
    );
    Ok(true)
}

/// A summary printed inside the frame, e.g. `| (2 rows) |`.
fn is_framed_summary(line: &str, grid: &Grid) -> bool {
    grid.has_frame()
        && is_summary_line(line.trim().trim_matches(|ch: char| headline::is_rule(ch)))
}
