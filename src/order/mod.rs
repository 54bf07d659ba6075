//! Display order of stored lines.
//!
//! The [`OrderIndex`] maps a display position to the physical position of a
//! line. Sorting permutes the index and never touches the pages, so the
//! original order is restored by rebuilding the identity index.

mod collate;
mod sort;

pub use collate::CollationKey;
pub use sort::{SortDirection, SortKey, SortRequest, SortValue, sort_by_column};

use serde::Serialize;

use crate::store::{PAGE_CAPACITY, PagedLineStore, RowPos};

/// One entry of the order index: the page and in-page offset of a line.
pub type OrderEntry = RowPos;

/// Permutation from display position to physical line position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OrderIndex {
    entries: Vec<OrderEntry>,
}

impl OrderIndex {
    /// Storage order for `row_count` lines.
    pub fn build_identity(row_count: usize) -> Self {
        let mut index = Self {
            entries: Vec::with_capacity(row_count),
        };
        index.extend_identity(row_count);
        index
    }

    /// Append identity entries for rows stored since the index was built.
    pub fn extend_identity(&mut self, row_count: usize) {
        let start = self.entries.len();
        self.entries.extend((start..row_count).map(|row| RowPos {
            page: row / PAGE_CAPACITY,
            offset: row % PAGE_CAPACITY,
        }));
    }

    pub(crate) const fn from_entries(entries: Vec<OrderEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Physical position shown at display position `position`.
    pub fn get(&self, position: usize) -> Option<OrderEntry> {
        self.entries.get(position).copied()
    }

    pub fn entries(&self) -> &[OrderEntry] {
        &self.entries
    }

    /// True when display order equals storage order.
    pub fn is_identity(&self) -> bool {
        self.entries.iter().enumerate().all(|(row, entry)| {
            entry.page == row / PAGE_CAPACITY && entry.offset == row % PAGE_CAPACITY
        })
    }

    /// Absolute row numbers in display order.
    pub fn rows(&self, store: &PagedLineStore) -> Vec<usize> {
        self.entries
            .iter()
            .filter_map(|entry| store.row_of(*entry))
            .collect()
    }
}
