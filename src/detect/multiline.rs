//! Detection of logical rows wrapped across several physical lines.
//!
//! psql ends the visible part of a cell that continues on the next line with
//! a marker in the cell's right margin: `+` for an embedded newline in ascii
//! style, `↵` and `…` in unicode style.

use std::ops::RangeInclusive;

use super::TableDescriptor;
use crate::cursor::Mark;
use crate::error::Result;
use crate::store::PagedLineStore;
use crate::text::{char_at_column, is_blank};

fn is_continuation_marker(ch: char) -> bool {
    matches!(ch, '+' | '↵' | '…')
}

/// True when some cell of `line` continues on the following line.
pub fn continues(desc: &TableDescriptor, line: &str) -> bool {
    if is_blank(line) {
        return false;
    }
    desc.cranges.iter().any(|range| {
        range
            .dmax
            .checked_sub(1)
            .and_then(|col| char_at_column(line, col))
            .is_some_and(is_continuation_marker)
    })
}

/// Byte span of the visible part of `column` in `line` when that cell
/// continues on the next line: the cell without its marker and trailing
/// padding.
pub(crate) fn continued_head(
    desc: &TableDescriptor,
    line: &str,
    column: usize,
) -> Option<(usize, usize)> {
    let marker_col = desc.cranges.get(column)?.dmax.checked_sub(1)?;
    let marker = char_at_column(line, marker_col).filter(|ch| is_continuation_marker(*ch))?;
    let (start, end) = desc.cell_span(line, column)?;
    let cell = line[start..end].trim_end();
    let head = cell.strip_suffix(marker).unwrap_or(cell).trim_end();
    Some((start, start + head.len()))
}

/// Flag continuation lines among the data rows in `rows`.
///
/// The row just before the range is consulted so that appended rows are
/// classified with the same result a full pass would give.
pub fn mark_rows(
    store: &mut PagedLineStore,
    desc: &mut TableDescriptor,
    rows: RangeInclusive<usize>,
) -> Result<()> {
    let (start, end) = (*rows.start(), *rows.end());
    let mut previous_continues = start > desc.first_data_row
        && start
            .checked_sub(1)
            .and_then(|row| store.get(row))
            .is_some_and(|(line, _)| continues(desc, line));

    for row in start..=end {
        let Some((line, _)) = store.get(row) else {
            break;
        };
        let this_continues = continues(desc, line);
        if let Some(mark) = Mark::at_row(store, row) {
            mark.set_continuation(store, previous_continues, !this_continues)?;
        }
        desc.has_multilines |= this_continues;
        previous_continues = this_continues;
    }
    Ok(())
}

/// Run the multiline pass over all data rows once.
pub fn multilines_detection(store: &mut PagedLineStore, desc: &mut TableDescriptor) -> Result<()> {
    if desc.multilines_already_tested {
        return Ok(());
    }
    let grid_rows = desc
        .last_data_row
        .filter(|_| !desc.is_expanded_mode && desc.headline.is_some())
        .map(|last| desc.first_data_row..=last);
    if let Some(rows) = grid_rows {
        mark_rows(store, desc, rows)?;
    }
    desc.multilines_already_tested = true;
    tracing::debug!(has_multilines = desc.has_multilines, "multiline detection done");
    Ok(())
}
