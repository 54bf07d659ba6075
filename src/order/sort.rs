//! Sorting the data rows of a table by one column.

use std::cmp::Ordering;
use std::sync::atomic::{self, AtomicBool};

use serde::Serialize;

use super::collate::CollationKey;
use super::{OrderEntry, OrderIndex};
use crate::cursor::LineIter;
use crate::detect::TableDescriptor;
use crate::error::{EngineError, Result};
use crate::perf;
use crate::store::PagedLineStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Which column to sort by and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SortRequest {
    pub column: usize,
    pub direction: SortDirection,
    /// Force numeric (`Some(true)`) or text (`Some(false)`) comparison.
    /// `None` uses the column's declared kind, then auto-detection.
    pub numeric: Option<bool>,
}

/// The comparable value of one cell.
///
/// `Missing` orders before every other value.
#[derive(Debug, Clone)]
pub enum SortValue {
    Missing,
    Numeric(f64),
    Collated(CollationKey),
}

impl SortValue {
    const fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Numeric(_) => 1,
            Self::Collated(_) => 2,
        }
    }
}

impl Ord for SortValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.total_cmp(b),
            (Self::Collated(a), Self::Collated(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortValue {}

/// A logical row (a data line plus its continuation lines) and its value.
#[derive(Debug, Clone)]
pub struct SortKey {
    pub entries: Vec<OrderEntry>,
    pub value: SortValue,
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Sort the data rows of `order` by one column and return the new order.
///
/// Rows outside the data region keep their display positions. Lines
/// flagged as continuations move together with the line they continue.
/// The sort is stable in both directions.
///
/// # Errors
/// - [`EngineError::SortUnsupported`] for expanded record layouts
/// - [`EngineError::ColumnOutOfRange`] for an unknown column
/// - [`EngineError::Interrupted`] when `interrupt` is raised; `order` is left
///   as it was
pub fn sort_by_column(
    store: &PagedLineStore,
    desc: &TableDescriptor,
    order: &OrderIndex,
    request: &SortRequest,
    interrupt: &AtomicBool,
) -> Result<OrderIndex> {
    let _scope = perf::scope("order.sort");
    if desc.is_expanded_mode {
        return Err(EngineError::SortUnsupported);
    }
    let column = desc
        .column(request.column)
        .ok_or(EngineError::ColumnOutOfRange {
            column: request.column,
            columns: desc.columns,
        })?;

    let mut slots = Vec::new();
    let mut groups: Vec<(Vec<OrderEntry>, &str)> = Vec::new();
    for line in LineIter::new(store, order) {
        if interrupt.load(atomic::Ordering::Relaxed) {
            tracing::debug!(position = line.position, "sort interrupted");
            return Err(EngineError::Interrupted);
        }
        if !desc.is_data_row(line.lineno) {
            continue;
        }
        slots.push(line.position);
        if let Some((entries, _)) = groups.last_mut().filter(|_| line.info.is_continuation()) {
            entries.push(line.row_pos());
        } else {
            let cell = desc.cell(line.text, request.column).trim();
            groups.push((vec![line.row_pos()], cell));
        }
    }

    let numeric = request.numeric.or(column.numeric).unwrap_or_else(|| {
        let mut cells = groups.iter().map(|(_, cell)| *cell).filter(|cell| !cell.is_empty());
        let mut any = false;
        let all = cells.all(|cell| {
            any = true;
            parse_number(cell).is_some()
        });
        any && all
    });

    let mut keys: Vec<SortKey> = groups
        .into_iter()
        .map(|(entries, cell)| {
            let value = if numeric {
                parse_number(cell).map_or(SortValue::Missing, SortValue::Numeric)
            } else if cell.is_empty() {
                SortValue::Missing
            } else {
                SortValue::Collated(CollationKey::new(cell))
            };
            SortKey { entries, value }
        })
        .collect();

    match request.direction {
        SortDirection::Ascending => keys.sort_by(|a, b| a.value.cmp(&b.value)),
        SortDirection::Descending => keys.sort_by(|a, b| b.value.cmp(&a.value)),
    }

    let mut entries = order.entries().to_vec();
    let sorted = keys.into_iter().flat_map(|key| key.entries);
    for (slot, entry) in slots.into_iter().zip(sorted) {
        entries[slot] = entry;
    }
    tracing::debug!(
        column = request.column,
        direction = ?request.direction,
        numeric,
        "sorted data rows"
    );
    Ok(OrderIndex::from_entries(entries))
}
