//! Row sources: fields that arrive already split.
//!
//! CSV, TSV and whitespace matrices (or a result set handed over by a
//! client library) are formatted into psql-style lines before they reach
//! the store. The column geometry is known while formatting, so the table
//! descriptor is built directly instead of being inferred from the text.

use std::io::Read;

use serde::Serialize;

use crate::cursor::Mark;
use crate::detect::{ColumnRange, TableDescriptor};
use crate::error::Result;
use crate::perf;
use crate::store::PagedLineStore;
use crate::text::display_width;

/// Content type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Numeric,
}

/// Header plus rows of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
    /// Declared column kinds; inferred from the fields when absent.
    pub kinds: Option<Vec<ColumnKind>>,
}

impl RowSet {
    pub fn new(header: Option<Vec<String>>, rows: Vec<Vec<String>>) -> Self {
        Self {
            header,
            rows,
            kinds: None,
        }
    }

    #[must_use]
    pub fn with_kinds(mut self, kinds: Vec<ColumnKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    /// Read delimited text. With `has_header` the first record names the
    /// columns. Ragged records are accepted.
    ///
    /// # Errors
    /// Returns [`crate::EngineError::Csv`] for malformed input.
    pub fn from_delimited<R: Read>(reader: R, delimiter: u8, has_header: bool) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record?;
            records.push(record.iter().map(ToOwned::to_owned).collect::<Vec<_>>());
        }
        let header = if has_header && !records.is_empty() {
            Some(records.remove(0))
        } else {
            None
        };
        Ok(Self::new(header, records))
    }

    /// Whitespace separated fields, one row per non-blank line.
    pub fn from_matrix(text: &str) -> Self {
        let rows = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split_whitespace().map(ToOwned::to_owned).collect())
            .collect();
        Self::new(None, rows)
    }

    pub fn columns(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(self.header.as_ref().map(Vec::len))
            .max()
            .unwrap_or(0)
    }

    fn field(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|fields| fields.get(column))
            .map_or("", String::as_str)
    }

    /// Declared kind, or `Numeric` when every non-empty field parses as a
    /// number.
    pub fn column_kind(&self, column: usize) -> ColumnKind {
        if let Some(kind) = self.kinds.as_ref().and_then(|kinds| kinds.get(column)) {
            return *kind;
        }
        let mut fields = (0..self.rows.len())
            .map(|row| self.field(row, column).trim())
            .filter(|field| !field.is_empty())
            .peekable();
        if fields.peek().is_none() {
            return ColumnKind::Text;
        }
        if fields.all(|field| field.parse::<f64>().is_ok()) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Text
        }
    }

    fn column_name(&self, column: usize) -> String {
        self.header
            .as_ref()
            .and_then(|header| header.get(column))
            .cloned()
            .unwrap_or_else(|| format!("column{}", column + 1))
    }
}

/// Formatted lines plus the geometry they were laid out with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedTable {
    pub lines: Vec<String>,
    pub cranges: Vec<ColumnRange>,
    /// Per data line: some cell continues on the next line.
    pub continues: Vec<bool>,
    pub footer: String,
}

impl FormattedTable {
    pub const NAMES_ROW: usize = 0;
    pub const HEAD_ROW: usize = 1;
    pub const FIRST_DATA_ROW: usize = 2;

    pub fn data_lines(&self) -> usize {
        self.continues.len()
    }
}

fn pad(out: &mut String, count: usize) {
    out.extend(std::iter::repeat_n(' ', count));
}

fn render_cell(out: &mut String, text: &str, width: usize, kind: ColumnKind, marker: char) {
    let padding = width.saturating_sub(display_width(text));
    out.push(' ');
    match kind {
        ColumnKind::Numeric => {
            pad(out, padding);
            out.push_str(text);
        }
        ColumnKind::Text => {
            out.push_str(text);
            pad(out, padding);
        }
    }
    out.push(marker);
}

fn render_header(names: &[String], widths: &[usize]) -> String {
    let mut out = String::new();
    for (idx, (name, width)) in names.iter().zip(widths).enumerate() {
        if idx > 0 {
            out.push('|');
        }
        let padding = width.saturating_sub(display_width(name));
        let left = padding / 2;
        out.push(' ');
        pad(&mut out, left);
        out.push_str(name);
        pad(&mut out, padding - left);
        out.push(' ');
    }
    out
}

/// Lay out `rows` the way psql prints a result with its default border.
///
/// Fields holding newlines span several lines; every line but the last of
/// such a cell ends with a `+` in the cell's right margin.
pub fn format_rows(rows: &RowSet) -> FormattedTable {
    let _scope = perf::scope("rows.format");
    let columns = rows.columns().max(1);
    let names: Vec<String> = (0..columns).map(|col| rows.column_name(col)).collect();
    let kinds: Vec<ColumnKind> = (0..columns).map(|col| rows.column_kind(col)).collect();

    let mut widths: Vec<usize> = names.iter().map(|name| display_width(name)).collect();
    for row in 0..rows.rows.len() {
        for (col, width) in widths.iter_mut().enumerate() {
            let widest = rows
                .field(row, col)
                .lines()
                .map(display_width)
                .max()
                .unwrap_or(0);
            *width = (*width).max(widest);
        }
    }

    let mut cranges = Vec::with_capacity(columns);
    let mut start = 0usize;
    for (col, width) in widths.iter().enumerate() {
        let end = start + width + 2;
        cranges.push(ColumnRange {
            xmin: start,
            xmax: end,
            dmin: start,
            dmax: end,
            name: names[col].clone(),
            name_pos: 0,
            name_width: display_width(&names[col]),
            name_offset: 0,
            name_size: names[col].len(),
            numeric: Some(kinds[col] == ColumnKind::Numeric),
        });
        start = end + 1;
    }

    let namesline = render_header(&names, &widths);
    for range in &mut cranges {
        range.locate_name(&namesline);
    }
    let headline = widths
        .iter()
        .map(|width| "-".repeat(width + 2))
        .collect::<Vec<_>>()
        .join("+");

    let mut lines = vec![namesline, headline];
    let mut continues = Vec::new();
    for row in 0..rows.rows.len() {
        let cells: Vec<Vec<&str>> = (0..columns)
            .map(|col| {
                let field = rows.field(row, col);
                if field.is_empty() {
                    vec![""]
                } else {
                    field.lines().collect()
                }
            })
            .collect();
        let height = cells.iter().map(Vec::len).max().unwrap_or(1);
        for segment in 0..height {
            let mut line = String::new();
            let mut any_continues = false;
            for (col, parts) in cells.iter().enumerate() {
                if col > 0 {
                    line.push('|');
                }
                let text = parts.get(segment).copied().unwrap_or("");
                let more = segment + 1 < parts.len();
                any_continues |= more;
                render_cell(
                    &mut line,
                    text,
                    widths[col],
                    kinds[col],
                    if more { '+' } else { ' ' },
                );
            }
            lines.push(line);
            continues.push(any_continues);
        }
    }

    let count = rows.rows.len();
    let footer = format!("({count} {})", if count == 1 { "row" } else { "rows" });
    lines.push(footer.clone());
    FormattedTable {
        lines,
        cranges,
        continues,
        footer,
    }
}

/// Store a formatted table and build its descriptor from the known layout.
///
/// # Errors
/// Fails only when flag writes hit a stale store.
pub fn load_formatted(store: &mut PagedLineStore, table: &FormattedTable) -> Result<TableDescriptor> {
    let first_row = store.row_count();
    for line in &table.lines {
        store.append(line.as_str());
    }
    let names_row = first_row + FormattedTable::NAMES_ROW;
    let head_row = first_row + FormattedTable::HEAD_ROW;
    let first_data_row = first_row + FormattedTable::FIRST_DATA_ROW;
    let data_lines = table.data_lines();
    let footer_row = first_data_row + data_lines;

    let mut previous = false;
    for (offset, continues) in table.continues.iter().enumerate() {
        if let Some(mark) = Mark::at_row(store, first_data_row + offset) {
            mark.set_continuation(store, previous, !continues)?;
        }
        previous = *continues;
    }
    if let Some(mark) = Mark::at_row(store, footer_row) {
        mark.set_unknown(store, true)?;
    }

    let line = |row: usize| store.get(row).map(|(line, _)| line.to_string());
    let mut desc = TableDescriptor {
        border_head_row: Some(head_row),
        title_rows: first_row,
        namesline: line(names_row),
        cranges: table.cranges.clone(),
        columns: table.cranges.len(),
        first_data_row,
        last_data_row: (data_lines > 0).then(|| footer_row - 1),
        footer_row: Some(footer_row),
        last_row: Some(footer_row),
        total_rows: store.row_count(),
        data_rows: data_lines,
        fixed_rows: FormattedTable::FIRST_DATA_ROW,
        fixed_columns: 1,
        has_multilines: table.continues.iter().any(|c| *c),
        multilines_already_tested: true,
        max_bytes: store.max_bytes(),
        max_width: store.max_width(),
        initialized: true,
        ..TableDescriptor::default()
    };
    desc.attach_headline(line(head_row).unwrap_or_default());
    desc.measure_footer(store);
    tracing::debug!(
        columns = desc.columns,
        rows = data_lines,
        multilines = desc.has_multilines,
        "loaded row source"
    );
    Ok(desc)
}
